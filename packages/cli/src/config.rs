//! Run configuration embedded from `run.toml`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use fire_map_report::{FiresByCountryParams, RunEnvironment};
use fire_map_source::{BoundarySource, is_url};
use serde::Deserialize;

/// Run settings baked into the binary at compile time.
const RUN_TOML: &str = include_str!("../run.toml");

/// Errors in the run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML syntax or shape error.
    #[error("Invalid run configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value parsed but cannot be used.
    #[error("Invalid run configuration: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// Parsed `run.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Report inputs and switches.
    pub report: FiresByCountryParams,
    /// Output environment.
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

/// The `[environment]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub overwrite_output: bool,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            overwrite_output: true,
            scratch_dir: None,
        }
    }
}

impl RunConfig {
    /// The configuration compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded `run.toml` is invalid.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::parse(RUN_TOML)
    }

    /// Parses and validates a run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `text` is not valid TOML, does not match
    /// the expected shape, or names an unusable value.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let report = &self.report;
        for (name, value) in [
            ("fire_csv", &report.fire_csv),
            ("longitude_field", &report.longitude_field),
            ("latitude_field", &report.latitude_field),
            ("confidence_field", &report.confidence_field),
            ("boundary_id_field", &report.boundary_id_field),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("report.{name} is empty"),
                });
            }
        }

        let distance = report.border_distance;
        if report.find_near_border && !(distance.value.is_finite() && distance.value > 0.0) {
            return Err(ConfigError::Invalid {
                message: format!("report.border_distance must be positive, got {distance}"),
            });
        }

        Ok(())
    }

    /// Report parameters with relative paths resolved against
    /// `working_dir`. URLs and absolute paths are kept as-is.
    #[must_use]
    pub fn params(&self, working_dir: &Path) -> FiresByCountryParams {
        let mut params = self.report.clone();

        if !is_url(&params.fire_csv) && Path::new(&params.fire_csv).is_relative() {
            params.fire_csv = working_dir.join(&params.fire_csv).display().to_string();
        }
        params.output_dir = resolve(working_dir, &params.output_dir);
        if let BoundarySource::GeojsonFile { path, .. } = &mut params.boundaries {
            *path = resolve(working_dir, path);
        }

        params
    }

    /// Output environment for a run on `run_date`.
    #[must_use]
    pub fn environment(&self, working_dir: &Path, run_date: NaiveDate) -> RunEnvironment {
        RunEnvironment {
            overwrite_output: self.environment.overwrite_output,
            scratch_dir: self
                .environment
                .scratch_dir
                .as_deref()
                .map(|dir| resolve(working_dir, dir)),
            run_date,
        }
    }
}

fn resolve(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        working_dir.join(path)
    } else {
        path.to_path_buf()
    }
}
