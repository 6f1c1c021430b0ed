//! Settings file loading: format detection, error context, and the
//! bundle-name table for the retention engine.

use assert_fs::prelude::*;
use logward_core::{retention, LogSettings, RetentionError, Settings, SettingsError};
use predicates::prelude::predicate;
use rstest::rstest;

// ---------------------------------------------------------------------------
// 1. Loading from disk
// ---------------------------------------------------------------------------

#[test]
fn load_properties_file() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("logging.properties");
    file.write_str("log.level=DEBUG\nlog.file.path=/srv/app/logs\n")
        .expect("write");

    let settings = Settings::load(file.path()).expect("load");
    assert_eq!(settings.get("log.level"), Some("DEBUG"));
    assert_eq!(settings.get("log.file.path"), Some("/srv/app/logs"));
}

#[test]
fn load_yaml_file_by_extension() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("logging.YML");
    file.write_str("log:\n  archive: false\n  file:\n    maxHistory: 3\n")
        .expect("write");

    let typed = LogSettings::from_settings(&Settings::load(file.path()).expect("load"))
        .expect("typed");
    assert!(!typed.archive);
    assert_eq!(typed.max_history_days, 3);
}

#[test]
fn load_missing_file_reports_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let missing = dir.path().join("nope.properties");

    let err = Settings::load(&missing).unwrap_err();
    assert!(matches!(err, SettingsError::Read { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.properties"));
}

#[test]
fn load_broken_yaml_reports_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("logging.yaml");
    file.write_str("log: [unclosed\n").expect("write");

    let err = Settings::load(file.path()).unwrap_err();
    assert!(matches!(err, SettingsError::Yaml { .. }), "got: {err}");
    assert!(err.to_string().contains("logging.yaml"));
}

#[test]
fn loading_never_modifies_the_source() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("logging.properties");
    file.write_str("log.level=WARN\n").expect("write");

    Settings::load(file.path()).expect("load");
    file.assert(predicate::str::diff("log.level=WARN\n"));
}

// ---------------------------------------------------------------------------
// 2. Bundle naming table
// ---------------------------------------------------------------------------

#[rstest]
#[case("logs-2024-01-01.zip", true)]
#[case("logs-notadate.zip", true)]
#[case("logs-2024-01-01.zip.partial", false)]
#[case(".logs-2024-01-01.zip.partial", false)]
#[case("app.log.2024-01-01", false)]
#[case("logs-2024-01-01.tar.gz", false)]
fn bundle_name_convention(#[case] name: &str, #[case] expected: bool) {
    assert_eq!(retention::is_bundle_name(name), expected);
}

#[rstest]
#[case("2024-01-01")]
#[case("2023-12-31")]
#[case("2024-02-29")]
fn produced_bundle_names_round_trip_their_date(#[case] day: &str) {
    let name = retention::bundle_name(day);
    let parsed = retention::extract_date(&name).expect("date");
    assert_eq!(retention::format_date(parsed), day);
}

#[test]
fn non_date_bundle_is_malformed_not_a_panic() {
    let name = retention::bundle_name("nightly");
    assert!(matches!(
        retention::extract_date(&name),
        Err(RetentionError::MalformedBundleName { .. })
    ));
}
