//! Persisted settings
//!
//! Settings live in a flat JSON object shared with other dtool tools, so keys
//! this crate does not know about are carried through a load/save cycle
//! untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const LOCAL_BASE_URI_KEY: &str = "DTOOL_LOCAL_BASE_URI";
pub const METADATA_SCHEMA_DIRECTORY_KEY: &str = "DTOOL_METADATA_SCHEMA_DIRECTORY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed config file {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },
}

/// Settings read from a config file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URI datasets are created in and listed from
    #[serde(
        rename = "DTOOL_LOCAL_BASE_URI",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub local_base_uri: Option<String>,

    /// Directory holding master schemas as `<name>.json` files
    #[serde(
        rename = "DTOOL_METADATA_SCHEMA_DIRECTORY",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub metadata_schema_directory: Option<PathBuf>,

    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Where the settings live when no path is given.
pub fn default_config_path() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    home.join(".config").join("dtool").join("dtool.json")
}

/// Read settings from `path`. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let data = fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write settings to `path`, creating parent directories.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("dtool.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dtool.json");

        let settings = Settings {
            local_base_uri: Some("file:///data".to_string()),
            metadata_schema_directory: Some(PathBuf::from("/schemas")),
            ..Settings::default()
        };
        save_settings(&path, &settings).unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw[LOCAL_BASE_URI_KEY], "file:///data");
        assert_eq!(raw[METADATA_SCHEMA_DIRECTORY_KEY], "/schemas");

        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn test_unknown_keys_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dtool.json");
        fs::write(&path, json!({"DTOOL_USER_EMAIL": "me@example.com"}).to_string()).unwrap();

        let mut settings = load_settings(&path).unwrap();
        settings.local_base_uri = Some("file:///data".to_string());
        save_settings(&path, &settings).unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["DTOOL_USER_EMAIL"], "me@example.com");
        assert_eq!(raw[LOCAL_BASE_URI_KEY], "file:///data");
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dtool.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            load_settings(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
