#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV reports summarising fire detections against country boundaries.
//!
//! [`run_fires_by_country`] is the single entry point. It loads the fire
//! CSV and boundary polygons, runs every geoprocessing step through a
//! [`SpatialEngine`](fire_map_spatial::SpatialEngine), and writes up to
//! three run-dated CSVs with [`write_csv`].

pub mod csv_writer;
pub mod fires_by_country;
mod scratch;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use fire_map_source::SourceError;
use fire_map_spatial::SpatialError;
use fire_map_spatial_models::TableError;

pub use csv_writer::write_csv;
pub use fires_by_country::{
    FiresByCountryParams, ReportKind, RunSummary, WrittenReport, run_fires_by_country,
};

/// Errors that can occur while producing reports.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The destination is locked or access-denied, typically because a
    /// previous report is still open in another program.
    #[error("Permission denied: {}: {source}", .path.display())]
    PermissionDenied {
        /// File that could not be opened.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The destination exists and overwriting is disabled.
    #[error("Output already exists: {}", .0.display())]
    OutputExists(PathBuf),

    /// A requested column is not in the source table.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Header and field lists differ in length.
    #[error("Header has {header} columns but {fields} fields were requested")]
    HeaderMismatch {
        /// Number of header labels.
        header: usize,
        /// Number of fields.
        fields: usize,
    },

    /// I/O error (file write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input loading failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Geoprocessing failed.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Attribute table operation failed.
    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

impl ReportError {
    /// Whether the error is a locked or access-denied file, either a report
    /// or an input.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::Io(e) | Self::Source(SourceError::Io(e)) => is_locked(e),
            _ => false,
        }
    }

    /// Maps an I/O error on `path`, separating access-denied failures from
    /// the rest.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        if is_locked(&error) {
            Self::PermissionDenied {
                path: path.to_path_buf(),
                source: error,
            }
        } else {
            Self::Io(error)
        }
    }
}

/// Windows `ERROR_SHARING_VIOLATION` and `ERROR_LOCK_VIOLATION`, raised for
/// a file another program holds open. `std` maps neither to
/// [`std::io::ErrorKind::PermissionDenied`].
const WINDOWS_LOCK_CODES: [i32; 2] = [32, 33];

/// Whether `error` means the file is access-denied or held by another
/// program.
fn is_locked(error: &std::io::Error) -> bool {
    error.kind() == std::io::ErrorKind::PermissionDenied
        || (cfg!(windows)
            && error
                .raw_os_error()
                .is_some_and(|code| WINDOWS_LOCK_CODES.contains(&code)))
}

/// Settings shared by every output of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEnvironment {
    /// Replace existing reports. When `false`, an existing report is an
    /// error.
    pub overwrite_output: bool,
    /// Where intermediate layers are written as GeoJSON. `None` keeps them
    /// in memory only.
    pub scratch_dir: Option<PathBuf>,
    /// Date stamped into output names.
    pub run_date: NaiveDate,
}

impl RunEnvironment {
    /// Environment for a run on `run_date`, overwriting outputs and without
    /// a scratch directory.
    #[must_use]
    pub const fn new(run_date: NaiveDate) -> Self {
        Self {
            overwrite_output: true,
            scratch_dir: None,
            run_date,
        }
    }

    /// The run date as `MMDDYYYY`.
    #[must_use]
    pub fn date_stamp(&self) -> String {
        self.run_date.format("%m%d%Y").to_string()
    }
}

impl Default for RunEnvironment {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_stamp_is_month_day_year() {
        let env = RunEnvironment::new(NaiveDate::from_ymd_opt(2022, 4, 7).unwrap());
        assert_eq!(env.date_stamp(), "04072022");
        assert!(env.overwrite_output);
        assert!(env.scratch_dir.is_none());
    }

    #[test]
    fn separates_permission_errors() {
        let path = Path::new("outputs/report.csv");

        let denied = ReportError::from_io(
            path,
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        let missing =
            ReportError::from_io(path, std::io::Error::from(std::io::ErrorKind::NotFound));

        let locked_input = ReportError::Source(SourceError::Io(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        )));

        assert!(denied.is_permission_denied());
        assert!(locked_input.is_permission_denied());
        assert!(!missing.is_permission_denied());
        assert!(denied.to_string().starts_with("Permission denied: outputs/report.csv"));
    }

    #[cfg(windows)]
    #[test]
    fn sharing_and_lock_violations_are_permission_errors() {
        let path = Path::new("outputs/report.csv");

        for code in WINDOWS_LOCK_CODES {
            let err = ReportError::from_io(path, std::io::Error::from_raw_os_error(code));
            assert!(matches!(err, ReportError::PermissionDenied { .. }), "{err}");

            let input = ReportError::Source(SourceError::Io(std::io::Error::from_raw_os_error(code)));
            assert!(input.is_permission_denied());
        }
    }

    #[cfg(unix)]
    #[test]
    fn unix_errno_32_is_not_a_lock() {
        // EPIPE shares the number of ERROR_SHARING_VIOLATION.
        let err = ReportError::from_io(
            Path::new("outputs/report.csv"),
            std::io::Error::from_raw_os_error(32),
        );
        assert!(matches!(err, ReportError::Io(_)));
        assert!(!err.is_permission_denied());
    }
}
