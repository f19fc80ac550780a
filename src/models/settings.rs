//! Settings-backed models
//!
//! Both models read and write a single key of the settings file at the path
//! they were constructed with, leaving every other key alone.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde_json::Value;

use super::ModelError;
use crate::config::{load_settings, save_settings, Settings};
use crate::metadata::MetadataModel;
use crate::storage::uri::sanitise_uri;

fn update_settings(
    config_path: &Path,
    update: impl FnOnce(&mut Settings),
) -> Result<(), ModelError> {
    let mut settings = load_settings(config_path)?;
    update(&mut settings);
    save_settings(config_path, &settings)?;
    Ok(())
}

/// The base URI datasets are created in and listed from
#[derive(Clone, Debug)]
pub struct LocalBaseUriModel {
    config_path: PathBuf,
}

impl LocalBaseUriModel {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The configured base URI, if any.
    pub fn get_base_uri(&self) -> Result<Option<String>, ModelError> {
        Ok(load_settings(&self.config_path)?.local_base_uri)
    }

    /// Store a base URI. Bare paths are stored as absolute `file://` URIs.
    pub fn put_base_uri(&self, base_uri: &str) -> Result<(), ModelError> {
        let value = sanitise_uri(base_uri);
        info!("Setting base URI to {}", value);
        update_settings(&self.config_path, |s| s.local_base_uri = Some(value))
    }
}

/// The directory of master schemas users pick from
#[derive(Clone, Debug)]
pub struct MetadataSchemaListModel {
    config_path: PathBuf,
}

impl MetadataSchemaListModel {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn get_metadata_schema_directory(&self) -> Result<Option<PathBuf>, ModelError> {
        Ok(load_settings(&self.config_path)?.metadata_schema_directory)
    }

    /// Store the schema directory as an absolute path.
    pub fn put_metadata_schema_directory(&self, directory: &Path) -> Result<(), ModelError> {
        let absolute = if directory.is_absolute() {
            directory.to_path_buf()
        } else {
            std::env::current_dir()?.join(directory)
        };
        info!("Setting metadata schema directory to {}", absolute.display());
        update_settings(&self.config_path, |s| {
            s.metadata_schema_directory = Some(absolute)
        })
    }

    /// Names of the available master schemas: the sorted file stems of the
    /// schema directory. Empty when no directory is configured.
    pub fn metadata_model_names(&self) -> Result<Vec<String>, ModelError> {
        let Some(directory) = self.get_metadata_schema_directory()? else {
            return Ok(Vec::new());
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load `<directory>/<name>.json` into a fresh metadata model.
    pub fn get_metadata_model(&self, name: &str) -> Result<MetadataModel, ModelError> {
        let directory = self
            .get_metadata_schema_directory()?
            .ok_or_else(|| ModelError::InvalidSchemaFile {
                path: PathBuf::from(format!("{}.json", name)),
                reason: "no metadata schema directory configured".to_string(),
            })?;

        let path = directory.join(format!("{}.json", name));
        let data = fs::read(&path)?;
        let master_schema: Value =
            serde_json::from_slice(&data).map_err(|e| ModelError::InvalidSchemaFile {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let mut model = MetadataModel::new();
        model.load_master_schema(&master_schema)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_local_base_uri_model() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        assert!(!config_path.is_file());

        let base_uri_path = dir.path().join("datasets");
        let model = LocalBaseUriModel::new(&config_path);
        assert_eq!(model.get_base_uri().unwrap(), None);

        model.put_base_uri(&base_uri_path.to_string_lossy()).unwrap();
        assert!(config_path.is_file());

        let another = LocalBaseUriModel::new(&config_path);
        assert_eq!(
            another.get_base_uri().unwrap(),
            Some(sanitise_uri(&base_uri_path.to_string_lossy()))
        );
    }

    #[test]
    fn test_models_share_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        LocalBaseUriModel::new(&config_path)
            .put_base_uri("file:///data")
            .unwrap();
        MetadataSchemaListModel::new(&config_path)
            .put_metadata_schema_directory(Path::new("/schemas"))
            .unwrap();

        assert_eq!(
            LocalBaseUriModel::new(&config_path).get_base_uri().unwrap(),
            Some("file:///data".to_string())
        );
    }

    #[test]
    fn test_metadata_schema_list_model() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        let schema_dir = dir.path().join("schemas");
        fs::create_dir(&schema_dir).unwrap();

        let master_schema = json!({
            "type": "object",
            "properties": {
                "project": {"type": "string"},
                "age": {"type": "integer"}
            },
            "required": ["project"]
        });
        fs::write(schema_dir.join("plants.json"), master_schema.to_string()).unwrap();
        fs::write(schema_dir.join("basic.json"), r#"{"properties": {}}"#).unwrap();

        let model = MetadataSchemaListModel::new(&config_path);
        assert!(model.metadata_model_names().unwrap().is_empty());

        model.put_metadata_schema_directory(&schema_dir).unwrap();
        assert_eq!(model.get_metadata_schema_directory().unwrap(), Some(schema_dir));
        assert_eq!(model.metadata_model_names().unwrap(), vec!["basic", "plants"]);

        let metadata_model = model.get_metadata_model("plants").unwrap();
        assert_eq!(metadata_model.item_names(), vec!["age", "project"]);
        assert_eq!(metadata_model.required_item_names(), vec!["project"]);

        assert!(model.get_metadata_model("missing").is_err());
    }
}
