//! Metadata schemas and the schema-driven metadata model
//!
//! A master schema is a JSON document of the form
//! `{"properties": {name: schema, ...}, "required": [name, ...]}`. Each
//! property becomes a [`SchemaItem`]; the [`MetadataModel`] tracks which
//! items are required, which optional items are in use and the current
//! value of every item.

pub mod model;
pub mod render;
pub mod schema;

pub use model::MetadataModel;
pub use schema::{SchemaItem, SchemaType};

use thiserror::Error;

/// A field schema that is not itself a valid schema document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema must be an object, got {0}")]
    NotAnObject(String),

    #[error("'{0}' is not a supported schema type")]
    UnknownType(String),

    #[error("invalid value for '{keyword}': {reason}")]
    InvalidKeyword { keyword: String, reason: String },
}

impl SchemaError {
    pub(crate) fn keyword(keyword: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKeyword {
            keyword: keyword.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while reading or writing metadata values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("No metadata item named '{0}'")]
    UnknownItem(String),

    #[error("{0} not supported yet")]
    UnsupportedType(String),
}
