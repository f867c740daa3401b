use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use viromedash::config::{Config, ConfigLoader, NcbiEntry};
use viromedash::error::DashError;
use viromedash::ncbi::NcbiSettings;

#[test]
fn resolve_reads_json_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("viromedash.json");
    fs::write(
        &path,
        r#"{
  "schema_version": 1,
  "bind": "0.0.0.0",
  "port": 9000,
  "data_dir": "/srv/viromedash/data",
  "ncbi": { "email": "lab@example.org", "batch_size": 50, "timeout_secs": 20 }
}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.addr.to_string(), "0.0.0.0:9000");
    assert_eq!(resolved.data_dir, Utf8PathBuf::from("/srv/viromedash/data"));
    assert_eq!(resolved.static_dir, Utf8PathBuf::from("static"));
    assert_eq!(resolved.ncbi.email.as_deref(), Some("lab@example.org"));
    assert_eq!(resolved.ncbi.batch_size, 50);
    assert_eq!(resolved.ncbi.timeout, Duration::from_secs(20));
    assert_eq!(resolved.ncbi.max_retries, 3);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, DashError::ConfigRead(_));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("viromedash.json");
    fs::write(&path, "{ \"port\": \"eighty\" }").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, DashError::ConfigParse(_));
}

#[test]
fn invalid_bind_address_is_rejected() {
    let config = Config {
        bind: Some("localhost:80".to_string()),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, DashError::ConfigInvalid(_));
}

#[test]
fn blank_api_key_counts_as_absent() {
    let config = Config {
        ncbi: Some(NcbiEntry {
            api_key: Some("  ".to_string()),
            ..NcbiEntry::default()
        }),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert!(resolved.ncbi.api_key.is_none());
}

#[test]
fn environment_overrides_configured_ncbi_credentials() {
    let config = Config {
        ncbi: Some(NcbiEntry {
            api_key: Some("from-file".to_string()),
            email: Some("file@example.org".to_string()),
            ..NcbiEntry::default()
        }),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    let settings = resolved.ncbi.apply_env(|name| match name {
        "NCBI_API_KEY" => Some("from-env".to_string()),
        _ => None,
    });
    assert_eq!(settings.api_key.as_deref(), Some("from-env"));
    assert_eq!(settings.email.as_deref(), Some("file@example.org"));
}

#[test]
fn blank_environment_keeps_configured_value() {
    let settings = NcbiSettings {
        api_key: Some("from-file".to_string()),
        ..NcbiSettings::default()
    };
    let settings = settings.apply_env(|_| Some("   ".to_string()));
    assert_eq!(settings.api_key.as_deref(), Some("from-file"));
    assert_eq!(settings.email, None);
}
