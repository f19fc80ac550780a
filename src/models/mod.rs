//! Models mediating between the metadata model and the dataset store
//!
//! [`ProtoDataSetModel`] builds up and creates a new dataset,
//! [`DataSetModel`] edits a frozen one and [`DataSetListModel`] indexes the
//! datasets in a base URI. [`LocalBaseUriModel`] and
//! [`MetadataSchemaListModel`] expose the persisted settings they depend on.

pub mod dataset;
pub mod inference;
pub mod list;
pub mod proto;
pub mod settings;

pub use dataset::DataSetModel;
pub use inference::{infer_schema_type, metadata_model_from_dataset};
pub use list::{DataSetInfo, DataSetListModel};
pub use proto::ProtoDataSetModel;
pub use settings::{LocalBaseUriModel, MetadataSchemaListModel};

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigError;
use crate::metadata::render::{plain, summary_value};
use crate::metadata::{MetadataError, MetadataModel, SchemaError};
use crate::storage::StoreError;

/// Annotation holding the master schema of a dataset's metadata.
pub const METADATA_SCHEMA_ANNOTATION_NAME: &str = "_metadata_schema";

/// First line of every generated summary.
pub const SUMMARY_MARKER: &str = "---";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Cannot set input directory to: {}", .0.display())]
    DirectoryDoesNotExist(PathBuf),

    #[error("Dataset name has not been set")]
    MissingDataSetName,

    #[error("Input directory has not been set")]
    MissingInputDirectory,

    #[error("Base URI model has not been set")]
    MissingBaseUriModel,

    #[error("Metadata model has not been set")]
    MissingMetadataModel,

    #[error("Base URI has not been configured")]
    BaseUriNotSet,

    #[error("Missing required metadata: {0}")]
    MissingRequiredMetadata(String),

    #[error("Metadata {name} value not valid: {value}")]
    MetadataValidation { name: String, value: String },

    #[error("Annotation ({annotation}) and readme ({summary}) values do not match for key {key}")]
    MetadataConflict {
        key: String,
        summary: String,
        annotation: String,
    },

    #[error("No dataset has been loaded")]
    NoDataSetLoaded,

    #[error("Could not parse dataset summary: {0}")]
    InvalidSummary(String),

    #[error("Malformed metadata schema file {path}: {reason}")]
    InvalidSchemaFile { path: PathBuf, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not walk input directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Check that every required item is set and every in-scope item is valid.
pub(crate) fn validate_metadata(model: &MetadataModel) -> Result<(), ModelError> {
    for name in model.required_item_names() {
        if model.get_value(&name).is_none() {
            return Err(ModelError::MissingRequiredMetadata(name));
        }
    }

    for name in model.in_scope_item_names() {
        if !model.is_okay(&name) {
            let value = model.get_value(&name).map_or_else(|| "unset".to_string(), plain);
            return Err(ModelError::MetadataValidation { name, value });
        }
    }
    Ok(())
}

/// In-scope `(name, value)` pairs to persist as annotations.
///
/// Only meaningful after [`validate_metadata`] has passed.
pub(crate) fn in_scope_values(model: &MetadataModel) -> Vec<(String, Value)> {
    model
        .in_scope_item_names()
        .into_iter()
        .map(|name| {
            let value = model.get_value(&name).cloned().unwrap_or(Value::Null);
            (name, value)
        })
        .collect()
}

/// The free-text summary: the marker line, then `name: value` per item.
pub(crate) fn summary_content(values: &[(String, Value)]) -> String {
    let mut lines = vec![SUMMARY_MARKER.to_string()];
    for (name, value) in values {
        lines.push(format!("{}: {}", name, summary_value(value)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> MetadataModel {
        let mut model = MetadataModel::new();
        model
            .add_metadata_property("project", json!({"type": "string", "maxLength": 10}), true)
            .unwrap();
        model
            .add_metadata_property("age", json!({"type": "integer"}), false)
            .unwrap();
        model
    }

    #[test]
    fn test_validate_missing_required() {
        let model = model();
        assert!(matches!(
            validate_metadata(&model),
            Err(ModelError::MissingRequiredMetadata(name)) if name == "project"
        ));
    }

    #[test]
    fn test_validate_invalid_value() {
        let mut model = model();
        model.set_value("project", "too-long-project-name").unwrap();
        match validate_metadata(&model) {
            Err(ModelError::MetadataValidation { name, value }) => {
                assert_eq!(name, "project");
                assert_eq!(value, "too-long-project-name");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_selected_optional_items() {
        let mut model = model();
        model.set_value("project", "dtool-gui").unwrap();
        assert!(validate_metadata(&model).is_ok());

        // Selected but unset optional items fail validation as null.
        model.select_optional_item("age");
        assert!(matches!(
            validate_metadata(&model),
            Err(ModelError::MetadataValidation { value, .. }) if value == "unset"
        ));

        model.set_value("age", 3).unwrap();
        assert!(validate_metadata(&model).is_ok());
    }

    #[test]
    fn test_summary_content() {
        let mut model = model();
        model.set_value("project", "dtool-gui").unwrap();
        assert_eq!(
            summary_content(&in_scope_values(&model)),
            "---\nproject: dtool-gui"
        );

        model.select_optional_item("age");
        model.set_value("age", 3).unwrap();
        assert_eq!(
            summary_content(&in_scope_values(&model)),
            "---\nproject: dtool-gui\nage: 3"
        );
    }
}
