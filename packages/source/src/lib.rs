#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Input loaders for the fire map toolchain.
//!
//! Fire detections arrive as a CSV (local file or HTTP download) and become
//! a WGS84 [`PointLayer`](fire_map_spatial_models::PointLayer). Boundaries
//! come either from a hosted `ArcGIS` feature layer or from a local GeoJSON
//! file, described by a [`BoundarySource`].

pub mod arcgis;
pub mod features;
pub mod fires;
pub mod geojson_file;

use std::path::PathBuf;

use fire_map_spatial_models::{PolygonLayer, SpatialReference, TableError};
use serde::{Deserialize, Serialize};

pub use fires::{FireCsv, load_fire_points};

/// Errors that can occur while loading inputs.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// GeoJSON parsing or geometry conversion failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The feature service answered with an error envelope.
    #[error("ArcGIS error {code}: {message}")]
    ArcGis {
        /// Service error code.
        code: i64,
        /// Service error message.
        message: String,
    },

    /// A required input column is absent.
    #[error("Missing field '{field}' in {location}")]
    MissingField {
        /// The expected column.
        field: String,
        /// File or URL that was read.
        location: String,
    },

    /// Input could not be turned into a layer.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// Attribute table construction failed.
    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

/// Where boundary polygons are loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundarySource {
    /// A hosted `ArcGIS` `FeatureServer`/`MapServer` layer URL.
    FeatureService {
        /// Layer URL, e.g. `.../FeatureServer/0`.
        url: String,
    },
    /// A GeoJSON `FeatureCollection` on disk.
    GeojsonFile {
        /// Path to the file.
        path: PathBuf,
        /// WKID the coordinates are expressed in.
        #[serde(default = "default_geojson_wkid")]
        wkid: u32,
    },
}

const fn default_geojson_wkid() -> u32 {
    4326
}

const USER_AGENT: &str = concat!("fire_map/", env!("CARGO_PKG_VERSION"));

/// Builds the blocking HTTP client used for downloads and feature service
/// queries.
///
/// # Errors
///
/// Returns [`SourceError::Http`] if the client cannot be built.
pub fn build_client() -> Result<reqwest::blocking::Client, SourceError> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(Into::into)
}

/// Whether `location` should be downloaded rather than read from disk.
#[must_use]
pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

impl BoundarySource {
    /// Loads the boundary polygons in their native spatial reference.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source cannot be read or holds no
    /// usable polygons.
    pub fn load(&self) -> Result<PolygonLayer, SourceError> {
        match self {
            Self::FeatureService { url } => {
                let client = build_client()?;
                let reference = arcgis::describe_layer(&client, url)?;
                arcgis::fetch_polygons(&client, url, reference)
            }
            Self::GeojsonFile { path, wkid } => {
                geojson_file::read_polygons(path, SpatialReference::from_wkid(*wkid))
            }
        }
    }

    /// Human-readable location for log messages.
    #[must_use]
    pub fn location(&self) -> String {
        match self {
            Self::FeatureService { url } => url.clone(),
            Self::GeojsonFile { path, .. } => path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        boundaries: BoundarySource,
    }

    #[test]
    fn parses_feature_service_source() {
        let wrapper: Wrapper = serde_json::from_str(
            r#"{"boundaries": {"type": "feature_service", "url": "https://example.com/FeatureServer/0"}}"#,
        )
        .unwrap();

        assert_eq!(
            wrapper.boundaries,
            BoundarySource::FeatureService {
                url: "https://example.com/FeatureServer/0".to_string()
            }
        );
    }

    #[test]
    fn geojson_source_defaults_to_wgs84() {
        let wrapper: Wrapper = serde_json::from_str(
            r#"{"boundaries": {"type": "geojson_file", "path": "data/countries.geojson"}}"#,
        )
        .unwrap();

        assert_eq!(
            wrapper.boundaries,
            BoundarySource::GeojsonFile {
                path: PathBuf::from("data/countries.geojson"),
                wkid: 4326,
            }
        );
        assert_eq!(wrapper.boundaries.location(), "data/countries.geojson");
    }

    #[test]
    fn detects_http_locations() {
        assert!(is_url("https://firms.modaps.eosdis.nasa.gov/data/MODIS_C6_1_Global_24h.csv"));
        assert!(is_url("http://localhost/fires.csv"));
        assert!(!is_url("data/fires.csv"));
        assert!(!is_url("C:\\data\\fires.csv"));
    }
}
