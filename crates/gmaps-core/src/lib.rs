//! Shared domain types and configuration for the Google Maps scraper.

pub mod app_config;
pub mod config;
pub mod places;
pub mod request;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use places::{
    AttributeOption, AttributeSection, Coordinates, OpenHours, PlaceImage, PlaceRecord,
    PlaceStatus, ReviewRecord,
};
pub use request::ScrapeRequest;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
