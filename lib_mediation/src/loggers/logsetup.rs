use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("I/O error occurred: {0}")]
    IoError(#[from] io::Error),

    #[error("Invalid log filter {filter:?}: {reason}")]
    FilterError { filter: String, reason: String },

    #[error("Failed to install the tracing subscriber: {0}")]
    InitError(String),
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. With a `log_dir`, records are
/// also written (without ANSI colors) to a fresh timestamped file there,
/// after older files of `app_name` are cleaned up.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the life of the process.
pub fn setup_logging(
    app_name: &str,
    log_dir: Option<&Path>,
    log_level: &str,
) -> Result<Option<WorkerGuard>, LoggerError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level).map_err(|e| LoggerError::FilterError {
            filter: log_level.to_string(),
            reason: e.to_string(),
        })?,
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            cleanup_old_logs(dir, app_name, 1)?;
            let appender = tracing_appender::rolling::never(dir, log_file_name(app_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggerError::InitError(e.to_string()))?;

    Ok(guard)
}

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `{app_name}_YYYY-MM-DD_HH-MM-SS.log` in local time.
pub fn log_file_name(app_name: &str) -> String {
    format!(
        "{}_{}.log",
        app_name,
        chrono::Local::now().format(LOG_TIMESTAMP_FORMAT)
    )
}

/// Creation time encoded in a log file name written by [`log_file_name`]
/// for `app_name`. `None` for any other file, including logs of apps whose
/// name merely starts with `app_name`.
fn log_file_timestamp(file_name: &str, app_name: &str) -> Option<NaiveDateTime> {
    let stamp = file_name
        .strip_prefix(app_name)?
        .strip_prefix('_')?
        .strip_suffix(".log")?;
    NaiveDateTime::parse_from_str(stamp, LOG_TIMESTAMP_FORMAT).ok()
}

/// Deletes log files of `app_name` in `log_dir`, keeping the `keep` newest.
///
/// Only names of the exact `{app_name}_YYYY-MM-DD_HH-MM-SS.log` shape are
/// considered. Returns the number of deleted files. Failures to delete a
/// single file are reported on stderr and do not stop the cleanup.
pub fn cleanup_old_logs(log_dir: &Path, app_name: &str, keep: usize) -> Result<usize, LoggerError> {
    let mut log_files: Vec<(NaiveDateTime, PathBuf)> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let stamp = log_file_timestamp(path.file_name()?.to_str()?, app_name)?;
            Some((stamp, path))
        })
        .collect();

    // Newest first
    log_files.sort_by(|a, b| b.0.cmp(&a.0));

    let mut deleted = 0;
    for (_, old_file) in log_files.iter().skip(keep) {
        match fs::remove_file(old_file) {
            Ok(()) => deleted += 1,
            Err(e) => eprintln!("Failed to delete old log file {}: {}", old_file.display(), e),
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"line\n").unwrap();
    }

    #[test]
    fn test_cleanup_keeps_newest_of_app() {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let dir = temp_dir.path();
        touch(dir, "server_mediation_2024-01-01_00-00-00.log");
        touch(dir, "server_mediation_2024-03-01_00-00-00.log");
        touch(dir, "server_mediation_2024-02-01_00-00-00.log");
        touch(dir, "other_app_2020-01-01_00-00-00.log");
        touch(dir, "server_mediation_notes.txt");

        let deleted = cleanup_old_logs(dir, "server_mediation", 1).unwrap();
        assert_eq!(deleted, 2);

        let mut remaining: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "other_app_2020-01-01_00-00-00.log",
                "server_mediation_2024-03-01_00-00-00.log",
                "server_mediation_notes.txt",
            ]
        );
    }

    #[test]
    fn test_cleanup_ignores_apps_sharing_the_prefix() {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let dir = temp_dir.path();
        touch(dir, "server_mediation_2024-01-01_00-00-00.log");
        touch(dir, "server_mediation_2024-02-01_00-00-00.log");
        touch(dir, "server_mediation_v2_2023-01-01_00-00-00.log");
        touch(dir, "server_mediation_v2_2023-02-01_00-00-00.log");
        touch(dir, "server_mediation_latest.log");

        let deleted = cleanup_old_logs(dir, "server_mediation", 1).unwrap();
        assert_eq!(deleted, 1);
        assert!(!dir.join("server_mediation_2024-01-01_00-00-00.log").exists());
        assert!(dir.join("server_mediation_2024-02-01_00-00-00.log").exists());
        assert!(dir.join("server_mediation_v2_2023-01-01_00-00-00.log").exists());
        assert!(dir.join("server_mediation_v2_2023-02-01_00-00-00.log").exists());
        assert!(dir.join("server_mediation_latest.log").exists());
    }

    #[test]
    fn test_log_file_timestamp_requires_exact_shape() {
        assert!(log_file_timestamp("app_2024-05-06_07-08-09.log", "app").is_some());
        assert!(log_file_timestamp(&log_file_name("app"), "app").is_some());
        assert!(log_file_timestamp("app_v2_2024-05-06_07-08-09.log", "app").is_none());
        assert!(log_file_timestamp("app_2024-13-06_07-08-09.log", "app").is_none());
        assert!(log_file_timestamp("app_2024-05-06_07-08-09.txt", "app").is_none());
        assert!(log_file_timestamp("application_2024-05-06_07-08-09.log", "app").is_none());
    }

    #[test]
    fn test_cleanup_with_nothing_to_delete() {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        assert_eq!(cleanup_old_logs(temp_dir.path(), "server_mediation", 1).unwrap(), 0);
    }

    #[test]
    fn test_log_file_name_shape() {
        let name = log_file_name("server_mediation");
        assert!(name.starts_with("server_mediation_"));
        assert!(name.ends_with(".log"));
        // server_mediation_ + YYYY-MM-DD_HH-MM-SS + .log
        assert_eq!(name.len(), "server_mediation_".len() + 19 + 4);
    }
}
