//! Settings loading tests
//!
//! Environment variables are process-wide, so every test touching them is
//! serialized.

use ionos_cloud_modules::config::Settings;
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

fn settings_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

fn clear_env() {
    for variable in [
        "IONOS_MODULES_CONFIG",
        "IONOS_MODULES_POLL_INTERVAL",
        "IONOS_MODULES_HTTP_TIMEOUT",
    ] {
        std::env::remove_var(variable);
    }
}

#[test]
#[serial]
fn test_explicit_file() {
    clear_env();
    let file = settings_file(
        ".toml",
        "page_size = 25\nhttp_timeout = \"10s\"\n\n[endpoints]\ndns = \"http://localhost:8053\"\n",
    );

    let settings = Settings::load(Some(&file.path().to_path_buf())).unwrap();
    assert_eq!(settings.page_size, 25);
    assert_eq!(settings.http_timeout, Duration::from_secs(10));
    assert_eq!(settings.endpoint("dns"), Some("http://localhost:8053"));
    assert_eq!(settings.endpoint("compute"), None);
    assert_eq!(settings.poll_interval, Duration::from_secs(5));
}

#[test]
#[serial]
fn test_file_named_by_environment() {
    clear_env();
    let file = settings_file(".json", r#"{"endpoints": {"logging": "http://localhost:9200"}}"#);
    std::env::set_var("IONOS_MODULES_CONFIG", file.path());

    let settings = Settings::load(None).unwrap();
    assert_eq!(settings.endpoint("logging"), Some("http://localhost:9200"));

    clear_env();
}

#[test]
#[serial]
fn test_environment_overrides_files() {
    clear_env();
    let file = settings_file(".yaml", "poll_interval: 30s\nhttp_timeout: 2m\n");
    std::env::set_var("IONOS_MODULES_POLL_INTERVAL", "250ms");

    let settings = Settings::load(Some(&file.path().to_path_buf())).unwrap();
    assert_eq!(settings.poll_interval, Duration::from_millis(250));
    assert_eq!(settings.http_timeout, Duration::from_secs(120));

    clear_env();
}

#[test]
#[serial]
fn test_missing_explicit_file_keeps_defaults() {
    clear_env();
    let settings = Settings::load(Some(&PathBuf::from("/nonexistent/ionos-modules.toml"))).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
#[serial]
fn test_invalid_files_and_values_are_errors() {
    clear_env();
    let file = settings_file(".toml", "page_size = \"many\"\n");
    let err = Settings::load(Some(&file.path().to_path_buf())).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));

    std::env::set_var("IONOS_MODULES_HTTP_TIMEOUT", "forever");
    let err = Settings::load(Some(&PathBuf::from("/nonexistent.toml"))).unwrap_err();
    assert!(err.to_string().contains("IONOS_MODULES_HTTP_TIMEOUT"));

    clear_env();
}

#[test]
fn test_settings_from_file_only() {
    let file = settings_file(".toml", "page_size = 7\n");
    let settings = Settings::from_file(file.path()).unwrap();
    assert_eq!(settings.page_size, 7);
}
