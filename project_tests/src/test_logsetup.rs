use std::fs;

use lib_mediation::loggers::logsetup::setup_logging;
use tempfile::tempdir;

/// # Logger Setup Integration Test
///
/// Installs the global subscriber with a file layer in a temporary directory
/// that already holds two older log files of the same app, then checks:
/// 1. Only the newest older file survives next to the new one.
/// 2. Records reach the new file once the writer guard is dropped.
///
/// The subscriber is process-global, so this binary holds a single test.
#[test]
fn test_setup_logging_writes_file_and_prunes_old_logs() {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let dir = temp_dir.path();
    fs::write(dir.join("test_app_2000-01-01_00-00-00.log"), b"oldest\n").unwrap();
    fs::write(dir.join("test_app_2000-01-02_00-00-00.log"), b"previous\n").unwrap();

    let guard = setup_logging("test_app", Some(dir), "info")
        .expect("Failed to set up logging")
        .expect("A file guard is returned when a log dir is given");

    tracing::warn!(country_code = "SI", "priority list replaced");
    drop(guard);

    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();

    assert_eq!(names.len(), 2, "unexpected log files: {:?}", names);
    assert_eq!(names[0], "test_app_2000-01-02_00-00-00.log");

    let content = fs::read_to_string(dir.join(&names[1])).unwrap();
    assert!(content.contains("priority list replaced"));
    assert!(content.contains("country_code"));
}
