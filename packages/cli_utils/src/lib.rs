#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the fire map toolchain.
//!
//! [`init_logger`] installs a `pretty_env_logger` console logger wrapped in
//! a [`TeeLogger`] that also appends every record to a run-dated log file,
//! so each run leaves a plain-text trail next to its reports.

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Log file for a run on `date`, under `working_dir/logs`.
#[must_use]
pub fn log_file_path(working_dir: &Path, date: NaiveDate) -> PathBuf {
    working_dir
        .join("logs")
        .join(format!("fire_map_{}.log", date.format("%m%d%Y")))
}

/// Formats a log file line: `LEVEL: MM/DD/YYYY hh:MM:SS message`, with a
/// 12-hour clock and no AM/PM marker.
#[must_use]
pub fn format_line(level: Level, timestamp: NaiveDateTime, message: impl Display) -> String {
    format!(
        "{level}: {} {message}",
        timestamp.format("%m/%d/%Y %I:%M:%S")
    )
}

/// Forwards records to a console logger and, when configured, appends them
/// to a log file.
pub struct TeeLogger {
    console: Box<dyn Log>,
    file: Option<Mutex<LineWriter<File>>>,
}

impl TeeLogger {
    /// Wraps `console`, appending to `file` as well when given.
    #[must_use]
    pub fn new(console: Box<dyn Log>, file: Option<File>) -> Self {
        Self {
            console,
            file: file.map(|f| Mutex::new(LineWriter::new(f))),
        }
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        self.console.log(record);

        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            let line = format_line(record.level(), Local::now().naive_local(), record.args());
            // Nowhere left to report a failed log write.
            let _ = writeln!(file, "{line}");
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            let _ = file.flush();
        }
    }
}

/// Initializes the global logger: colored console output via
/// `pretty_env_logger`, teed into `log_file` (created with its parent
/// directory, appended to) when given.
///
/// The level defaults to `info` and is overridden by `RUST_LOG`. An
/// already-installed logger is left in place (e.g., in tests).
///
/// # Errors
///
/// Returns an I/O error if the log file cannot be opened. No logger is
/// installed in that case.
pub fn init_logger(log_file: Option<&Path>) -> std::io::Result<()> {
    let file = log_file.map(open_log_file).transpose()?;

    // Build the pretty-env-logger logger manually so we can wrap it.
    let console = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = console.filter();

    log::set_boxed_logger(Box::new(TeeLogger::new(Box::new(console), file)))
        .ok(); // Ignore error if logger was already set (e.g., in tests)

    log::set_max_level(level);

    Ok(())
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn log_file_is_dated_under_logs() {
        let path = log_file_path(
            Path::new("/srv/fire-map"),
            NaiveDate::from_ymd_opt(2022, 4, 20).unwrap(),
        );
        assert_eq!(path, PathBuf::from("/srv/fire-map/logs/fire_map_04202022.log"));
    }

    #[test]
    fn formats_level_timestamp_and_message() {
        let timestamp = NaiveDate::from_ymd_opt(2022, 4, 20)
            .unwrap()
            .and_hms_opt(15, 4, 5)
            .unwrap();

        assert_eq!(
            format_line(Level::Warn, timestamp, "3 point(s) fall outside of boundaries!"),
            "WARN: 04/20/2022 03:04:05 3 point(s) fall outside of boundaries!"
        );
    }

    #[test]
    fn log_clock_is_twelve_hour() {
        let day = NaiveDate::from_ymd_opt(2022, 4, 20).unwrap();
        let midnight = day.and_hms_opt(0, 30, 0).unwrap();
        let noon = day.and_hms_opt(12, 30, 0).unwrap();

        assert_eq!(
            format_line(Level::Info, midnight, "Starting run..."),
            "INFO: 04/20/2022 12:30:00 Starting run..."
        );
        assert_eq!(
            format_line(Level::Info, noon, "Finished run"),
            "INFO: 04/20/2022 12:30:00 Finished run"
        );
    }

    struct Recorder {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl Log for Recorder {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.level() <= Level::Info
        }

        fn log(&self, record: &Record<'_>) {
            self.lines.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    #[test]
    fn tees_enabled_records_to_file() {
        let dir = std::env::temp_dir().join("fire_map_cli_utils_tee");
        let path = dir.join("run.log");
        let _ = std::fs::remove_file(&path);
        let lines = Arc::new(Mutex::new(Vec::new()));
        let logger = TeeLogger::new(
            Box::new(Recorder {
                lines: Arc::clone(&lines),
            }),
            Some(open_log_file(&path).unwrap()),
        );

        for (level, message) in [(Level::Info, "Starting run..."), (Level::Debug, "GET url")] {
            logger.log(
                &Record::builder()
                    .level(level)
                    .args(format_args!("{message}"))
                    .build(),
            );
        }
        logger.flush();

        assert_eq!(*lines.lock().unwrap(), vec!["Starting run...".to_string()]);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.starts_with("INFO: "));
        assert!(written.trim_end().ends_with(" Starting run..."));
    }
}
