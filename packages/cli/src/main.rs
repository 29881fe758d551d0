#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fires-by-country report runner.
//!
//! Runs the analysis configured in the embedded `run.toml` against a
//! working directory (`FIRE_MAP_WORKING_DIR`, default: the current
//! directory). Every run is logged to the console and appended to
//! `logs/fire_map_<MMDDYYYY>.log`. Failures are logged rather than
//! propagated, so the process always ends with the `Finished run` trailer.

mod config;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use fire_map_report::{ReportError, run_fires_by_country};
use fire_map_spatial::PlanarEngine;

use crate::config::{ConfigError, RunConfig};

/// Environment variable naming the directory inputs and outputs resolve
/// against.
const WORKING_DIR_ENV: &str = "FIRE_MAP_WORKING_DIR";

const SEPARATOR: &str = "----------------------------------------------------------------";

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl RunError {
    fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Report(e) if e.is_permission_denied())
    }
}

fn main() {
    let working_dir =
        std::env::var_os(WORKING_DIR_ENV).map_or_else(|| PathBuf::from("."), PathBuf::from);
    let run_date = Local::now().date_naive();

    let log_path = fire_map_cli_utils::log_file_path(&working_dir, run_date);
    if let Err(e) = fire_map_cli_utils::init_logger(Some(&log_path)) {
        let _ = fire_map_cli_utils::init_logger(None);
        log::warn!(
            "Logging to console only, cannot open {}: {e}",
            log_path.display()
        );
    }

    log::info!("Starting run...");

    if let Err(e) = run(&working_dir, run_date) {
        log_failure(&e);
    }

    log::info!("Finished run");
    log::info!("{SEPARATOR}");
    log::logger().flush();
}

fn run(working_dir: &Path, run_date: NaiveDate) -> Result<(), RunError> {
    let config = RunConfig::embedded()?;
    let params = config.params(working_dir);
    let env = config.environment(working_dir, run_date);

    log::info!("Finding point count by {}", params.boundary_id_field);
    let summary = run_fires_by_country(&PlanarEngine::new(), &params, &env)?;

    log::info!(
        "{} fire(s) processed, {} outside of boundaries",
        summary.fire_count,
        summary.outside_count
    );
    for report in &summary.reports {
        log::info!(
            "{:?}: {} row(s) in {}",
            report.kind,
            report.rows,
            report.path.display()
        );
    }

    Ok(())
}

fn log_failure(error: &RunError) {
    if error.is_permission_denied() {
        log::error!("PERMISSION ERROR");
        log::error!("{error}");
        log::error!("Ensure all previously created CSVs are closed!");
        log::error!(
            "Check that supporting data is not open in another program (GIS desktop applications)!"
        );
    } else {
        log::error!("EXCEPTION OCCURRED");
        log::error!("{error}");
    }
}
