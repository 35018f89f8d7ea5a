use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::Coords;

const USER_AGENT: &str = "GraduateProgramsEvaluator/1.0";

const PORTUGUESE_CITIES: [&str; 6] = ["Lisboa", "Porto", "Coimbra", "Braga", "Aveiro", "Faro"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Country {
    Spain,
    Portugal,
}

impl Country {
    /// Portuguese when the name mentions a known Portuguese city or
    /// "Portugal"; Spain otherwise.
    pub fn guess(ciudad: &str) -> Self {
        let portuguese = ciudad.contains("Portugal")
            || PORTUGUESE_CITIES.iter().any(|city| ciudad.contains(city));
        if portuguese {
            Country::Portugal
        } else {
            Country::Spain
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Country::Spain => "Spain",
            Country::Portugal => "Portugal",
        }
    }

    /// Reference city for the distance metric.
    pub fn capital(&self) -> &'static str {
        match self {
            Country::Spain => "Madrid",
            Country::Portugal => "Lisboa",
        }
    }
}

/// City → coordinates lookup. Failures are logged and read as `None`.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, ciudad: &str) -> Option<Coords>;
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: Url,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    async fn search(&self, ciudad: &str, country: Country) -> Result<Option<Coords>> {
        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[
                ("format", "json"),
                ("limit", "1"),
                ("city", ciudad),
                ("country", country.name()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Geocoding(format!(
                "Nominatim returned {}",
                response.status()
            )));
        }

        let places: Vec<Place> = response.json().await?;
        places.into_iter().next().map(parse_place).transpose()
    }
}

fn parse_place(place: Place) -> Result<Coords> {
    let parse = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|e| AppError::Geocoding(format!("Invalid coordinate '{}': {}", value, e)))
    };
    Ok(Coords {
        lat: parse(&place.lat)?,
        lon: parse(&place.lon)?,
    })
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn locate(&self, ciudad: &str) -> Option<Coords> {
        let country = Country::guess(ciudad);
        match self.search(ciudad, country).await {
            Ok(coords) => coords,
            Err(e) => {
                tracing::error!(
                    "Error getting coordinates for {} in {}: {}",
                    ciudad,
                    country.name(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portuguese_cities_are_recognised() {
        assert_eq!(Country::guess("Lisboa"), Country::Portugal);
        assert_eq!(Country::guess("Porto"), Country::Portugal);
        assert_eq!(Country::guess("Vila Real, Portugal"), Country::Portugal);
        assert_eq!(Country::guess("Salamanca"), Country::Spain);
        assert_eq!(Country::Portugal.capital(), "Lisboa");
        assert_eq!(Country::Spain.capital(), "Madrid");
    }

    #[test]
    fn place_coordinates_are_parsed() {
        let places: Vec<Place> =
            serde_json::from_str(r#"[{"lat":"40.4167","lon":"-3.7033","display_name":"Madrid"}]"#)
                .unwrap();
        let coords = parse_place(places.into_iter().next().unwrap()).unwrap();
        assert_eq!(coords, Coords { lat: 40.4167, lon: -3.7033 });
    }

    #[test]
    fn bad_coordinate_is_an_error() {
        let place = Place {
            lat: "north".into(),
            lon: "0".into(),
        };
        assert!(parse_place(place).is_err());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(NominatimGeocoder::new("not a url").is_err());
    }
}
