//! The schema-driven metadata model
//!
//! Holds the master schema as a set of named [`SchemaItem`]s, classifies the
//! names as required or optional, tracks which optional items are selected
//! and stores the current value of each item. A name with no stored value is
//! unset, which is distinct from a stored JSON `null`.

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use serde_json::{json, Map, Value};

use super::schema::{SchemaItem, SchemaType};
use super::{MetadataError, SchemaError};

/// Metadata items, their classification and their current values
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataModel {
    schema_items: BTreeMap<String, SchemaItem>,
    values: BTreeMap<String, Value>,
    required: BTreeSet<String>,
    selected: BTreeSet<String>,
}

impl MetadataModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// True until a schema has been loaded, and again after [`clear`](Self::clear).
    pub fn is_empty(&self) -> bool {
        self.schema_items.is_empty()
    }

    /// All item names, sorted.
    pub fn item_names(&self) -> Vec<String> {
        self.schema_items.keys().cloned().collect()
    }

    pub fn required_item_names(&self) -> Vec<String> {
        self.required.iter().cloned().collect()
    }

    pub fn optional_item_names(&self) -> Vec<String> {
        self.schema_items
            .keys()
            .filter(|name| !self.required.contains(*name))
            .cloned()
            .collect()
    }

    /// Optional items currently in use.
    pub fn selected_optional_item_names(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn deselected_optional_item_names(&self) -> Vec<String> {
        self.optional_item_names()
            .into_iter()
            .filter(|name| !self.selected.contains(name))
            .collect()
    }

    /// Required names followed by selected optional names, each sorted.
    pub fn in_scope_item_names(&self) -> Vec<String> {
        let mut names = self.required_item_names();
        names.extend(self.selected_optional_item_names());
        names
    }

    /// `(name, message)` for every problem with an in-scope value.
    ///
    /// Items that are unset are not reported.
    pub fn issues(&self) -> Vec<(String, String)> {
        let mut issues = Vec::new();
        for name in self.in_scope_item_names() {
            let (Some(schema), Some(value)) = (self.get_schema(&name), self.get_value(&name))
            else {
                continue;
            };
            for message in schema.issues(value) {
                issues.push((name.clone(), message));
            }
        }
        issues
    }

    /// Drop every schema item, value and selection.
    pub fn clear(&mut self) {
        self.schema_items.clear();
        self.values.clear();
        self.required.clear();
        self.selected.clear();
    }

    /// Load a master schema of the form
    /// `{"properties": {name: schema, ...}, "required": [name, ...]}`.
    ///
    /// Loading is additive; call [`clear`](Self::clear) first for a fresh
    /// model. Nothing is loaded if any property schema is invalid. Required
    /// names without a matching property are skipped.
    pub fn load_master_schema(&mut self, master_schema: &Value) -> Result<(), SchemaError> {
        let properties = master_schema
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| SchemaError::keyword("properties", "expected an object"))?;

        let mut items = Vec::with_capacity(properties.len());
        for (name, schema) in properties {
            items.push((name.clone(), SchemaItem::new(schema.clone())?));
        }

        let required: Vec<String> = match master_schema.get("required") {
            None => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| {
                    n.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| SchemaError::keyword("required", "expected strings"))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(SchemaError::keyword("required", "expected an array")),
        };

        self.schema_items.extend(items);
        for name in required {
            if self.schema_items.contains_key(&name) {
                self.required.insert(name);
            } else {
                warn!("Ignoring required metadata '{}' with no schema", name);
            }
        }
        Ok(())
    }

    /// Add or replace a single property of the master schema.
    pub fn add_metadata_property(
        &mut self,
        name: impl Into<String>,
        schema: Value,
        required: bool,
    ) -> Result<(), SchemaError> {
        let name = name.into();
        let item = SchemaItem::new(schema)?;
        self.schema_items.insert(name.clone(), item);
        if required {
            self.selected.remove(&name);
            self.required.insert(name);
        }
        Ok(())
    }

    /// The master schema describing the current items.
    pub fn get_master_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .schema_items
            .iter()
            .map(|(name, item)| (name.clone(), item.schema().clone()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_item_names(),
        })
    }

    pub fn get_schema(&self, name: &str) -> Option<&SchemaItem> {
        self.schema_items.get(name)
    }

    /// The stored value, or `None` if the item is unset.
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Store a value as-is. No coercion or validation takes place.
    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) -> Result<(), MetadataError> {
        if !self.schema_items.contains_key(name) {
            return Err(MetadataError::UnknownItem(name.to_string()));
        }
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Return an item to the unset state.
    pub fn unset_value(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// Coerce `raw` to the item's declared type and store it.
    ///
    /// Input that cannot be coerced leaves the item unset rather than failing;
    /// only a declared type outside string, integer, number and boolean is an
    /// error.
    pub fn set_value_from_str(&mut self, name: &str, raw: &str) -> Result<(), MetadataError> {
        let schema = self
            .get_schema(name)
            .ok_or_else(|| MetadataError::UnknownItem(name.to_string()))?;

        let coerced = match schema.schema_type() {
            Some(SchemaType::String) => {
                if raw.is_empty() {
                    None
                } else {
                    Some(Value::String(raw.to_string()))
                }
            }
            Some(SchemaType::Integer) => {
                info!("Forcing type to integer");
                match raw.trim().parse::<i64>() {
                    Ok(i) => Some(Value::from(i)),
                    Err(_) => {
                        warn!("Could not force to integer");
                        None
                    }
                }
            }
            Some(SchemaType::Number) => {
                info!("Forcing type to float");
                match raw.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                    Some(n) => Some(Value::Number(n)),
                    None => {
                        warn!("Could not force to float");
                        None
                    }
                }
            }
            Some(SchemaType::Boolean) => {
                info!("Forcing type to bool");
                match raw {
                    "True" => Some(Value::Bool(true)),
                    "False" => Some(Value::Bool(false)),
                    _ => {
                        warn!("Could not force to bool");
                        None
                    }
                }
            }
            other => {
                let type_name = other.map_or("untyped", |t| t.as_str());
                return Err(MetadataError::UnsupportedType(type_name.to_string()));
            }
        };

        match coerced {
            Some(value) => {
                self.values.insert(name.to_string(), value);
            }
            None => self.unset_value(name),
        }
        Ok(())
    }

    /// Validate the item's value against its schema.
    ///
    /// An unset item is validated as `null`, so it passes only schemas that
    /// accept `null`. Unknown names are never okay.
    pub fn is_okay(&self, name: &str) -> bool {
        match self.get_schema(name) {
            Some(schema) => schema.is_okay(self.get_value(name).unwrap_or(&Value::Null)),
            None => false,
        }
    }

    /// Mark an optional item as in use. Other names are ignored.
    pub fn select_optional_item(&mut self, name: &str) {
        if self.schema_items.contains_key(name) && !self.required.contains(name) {
            self.selected.insert(name.to_string());
        }
    }

    /// Mark a selected optional item as no longer in use. Other names are ignored.
    pub fn deselect_optional_item(&mut self, name: &str) {
        self.selected.remove(name);
    }
}
