//! Backend for a doctoral program rating dashboard: program storage,
//! university aggregation, AI/geocoding enrichment, search and a REST API.

pub mod aggregate;
pub mod ai;
pub mod api;
pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod models;
pub mod search;
pub mod services;

pub use app::App;
pub use config::Config;
pub use error::{AppError, Result};
