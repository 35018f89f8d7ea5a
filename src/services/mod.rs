mod geocoder;

pub use geocoder::{Country, Geocoder, NominatimGeocoder};
