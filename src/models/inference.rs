//! Reconstructing a metadata model from a persisted dataset
//!
//! The schema comes from the `_metadata_schema` annotation when present.
//! Items found only in the summary or the other annotations are added as
//! required items typed after their values.

use std::collections::BTreeSet;

use log::debug;
use serde_json::{json, Map, Value};

use super::{ModelError, METADATA_SCHEMA_ANNOTATION_NAME};
use crate::metadata::render::quote;
use crate::metadata::schema::values_equal;
use crate::metadata::{MetadataError, MetadataModel, SchemaType};
use crate::storage::DataSetHandle;

/// The schema type of a single value.
///
/// Only strings, booleans, integers and numbers are supported.
pub fn infer_schema_type(value: &Value) -> Result<SchemaType, MetadataError> {
    match value {
        Value::String(_) => Ok(SchemaType::String),
        Value::Bool(_) => Ok(SchemaType::Boolean),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(SchemaType::Integer),
        Value::Number(_) => Ok(SchemaType::Number),
        Value::Null => Err(MetadataError::UnsupportedType("null".to_string())),
        Value::Array(_) => Err(MetadataError::UnsupportedType("array".to_string())),
        Value::Object(_) => Err(MetadataError::UnsupportedType("object".to_string())),
    }
}

fn parse_summary(content: &str) -> Result<Map<String, Value>, ModelError> {
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    let parsed: Value =
        serde_yaml::from_str(content).map_err(|e| ModelError::InvalidSummary(e.to_string()))?;
    match parsed {
        Value::Object(map) => Ok(map),
        _ => {
            debug!("Dataset summary is not a mapping; ignoring it");
            Ok(Map::new())
        }
    }
}

fn add_inferred(
    model: &mut MetadataModel,
    schema_owned: &BTreeSet<String>,
    key: &str,
    value: &Value,
) -> Result<(), ModelError> {
    let schema_type = infer_schema_type(value)?;
    if !schema_owned.contains(key) {
        model.add_metadata_property(key, json!({"type": schema_type.as_str()}), true)?;
    }
    model.set_value(key, value.clone())?;
    Ok(())
}

/// Build the metadata model of a frozen dataset.
///
/// Fails with [`ModelError::MetadataConflict`] when the summary and an
/// annotation disagree about a value, and with an unsupported type error
/// when a value is not a string, boolean, integer or number.
pub fn metadata_model_from_dataset(dataset: &dyn DataSetHandle) -> Result<MetadataModel, ModelError> {
    let mut model = MetadataModel::new();
    let annotation_names = dataset.list_annotation_names()?;

    let mut schema_owned = BTreeSet::new();
    if annotation_names
        .iter()
        .any(|n| n == METADATA_SCHEMA_ANNOTATION_NAME)
    {
        let master_schema = dataset.get_annotation(METADATA_SCHEMA_ANNOTATION_NAME)?;
        model.load_master_schema(&master_schema)?;
        schema_owned.extend(model.item_names());
    }

    let summary = parse_summary(&dataset.get_readme()?)?;
    for (key, value) in &summary {
        add_inferred(&mut model, &schema_owned, key, value)?;
    }

    for key in &annotation_names {
        if key == METADATA_SCHEMA_ANNOTATION_NAME {
            continue;
        }

        let value = dataset.get_annotation(key)?;
        if let Some(summary_value) = summary.get(key) {
            if !values_equal(summary_value, &value) {
                return Err(ModelError::MetadataConflict {
                    key: key.clone(),
                    summary: quote(summary_value),
                    annotation: quote(&value),
                });
            }
        }
        add_inferred(&mut model, &schema_owned, key, &value)?;
    }

    Ok(model)
}
