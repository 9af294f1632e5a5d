use crate::error::{AppError, Result};

pub const DATA_PATH: &str = "kc_house_data.csv";
pub const GEOFILE_URL: &str =
    "https://opendata.arcgis.com/datasets/83fc2e72903343aabff6de8cb445b81c_2.geojson";

/// Known typo in the source dataset: a single listing with 33 bedrooms.
pub const INVALID_BEDROOMS: u32 = 33;

/// Minimum condition score (median) for a property to be a purchase candidate.
pub const MIN_BUY_CONDITION: f64 = 3.0;

/// Default decimal precision of the cluster-map grid (2 ≈ 1km cells).
pub const CLUSTER_PRECISION: u32 = 2;

/// Upper bound on cluster grid precision accepted from the API.
pub const MAX_CLUSTER_PRECISION: u32 = 6;

/// Markup tiers applied to buy recommendations.
pub mod markup {
    /// Bought at or below the zipcode/season median.
    pub const AT_OR_BELOW_MEDIAN: f64 = 1.30;
    /// Bought above the zipcode/season median.
    pub const ABOVE_MEDIAN: f64 = 1.10;
}

/// Cut-offs for the categorical features.
pub mod feature_thresholds {
    pub const CONSTRUCTION_YEAR: i32 = 1955;
    /// Grades strictly above this are "High" design.
    pub const HIGH_GRADE: u8 = 10;
    pub const MIN_VIEWS: u8 = 3;
    pub const MIN_FLOORS: f64 = 2.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Property CSV (DATA_PATH)
    pub data_path: String,
    /// GeoJSON boundary file (GEOFILE_URL). Empty disables the fetch.
    pub geofile_url: String,
    pub log_level: String,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            data_path: std::env::var("DATA_PATH").unwrap_or_else(|_| DATA_PATH.to_string()),
            geofile_url: std::env::var("GEOFILE_URL")
                .unwrap_or_else(|_| GEOFILE_URL.to_string())
                .trim()
                .to_string(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }
}
