//! Dataset storage
//!
//! The models never touch dataset files directly. They go through the
//! [`DataSetStore`] contract: create a proto dataset, fill it with items,
//! a free-text summary and annotations, freeze it, and later reopen it by URI
//! to read and update its name, annotations, summary and tags.

pub mod local;
pub mod uri;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use local::LocalDataSetStore;

/// Error types for storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Not a frozen dataset: {0}")]
    NotFrozen(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid item path: {0}")]
    InvalidItemPath(String),

    #[error("Annotation not found: {0}")]
    AnnotationNotFound(String),

    #[error("Unsupported URI: {0}")]
    UnsupportedUri(String),
}

/// Whether a dataset is still being built or has been frozen
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSetKind {
    ProtoDataSet,
    DataSet,
}

/// Administrative metadata recorded for every dataset
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AdminMetadata {
    pub uuid: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DataSetKind,
    pub creator_username: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub frozen_at: Option<DateTime<Utc>>,
}

/// One item in a frozen dataset
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ItemProperties {
    /// Path relative to the dataset root, always `/`-separated
    pub relpath: String,
    pub size_in_bytes: u64,
    /// Hex digest of the item content
    pub hash: String,
}

/// A store that datasets can be created in, opened from and listed
pub trait DataSetStore: Send + Sync {
    /// Start a new dataset called `name` under `base_uri`.
    fn create(&self, name: &str, base_uri: &str) -> Result<Box<dyn ProtoDataSetHandle>, StoreError>;

    /// Open a frozen dataset.
    fn open(&self, uri: &str) -> Result<Box<dyn DataSetHandle>, StoreError>;

    /// All frozen datasets under `base_uri`, sorted by name.
    fn list(&self, base_uri: &str) -> Result<Vec<Box<dyn DataSetHandle>>, StoreError>;
}

/// A dataset that is still writable
///
/// Dropping a handle without calling [`freeze`](Self::freeze) abandons the
/// dataset.
pub trait ProtoDataSetHandle: Send {
    fn uri(&self) -> &str;

    /// Copy `source` into the dataset as the item at `relpath`.
    fn put_item(&mut self, source: &Path, relpath: &str) -> Result<(), StoreError>;

    fn put_readme(&mut self, content: &str) -> Result<(), StoreError>;

    fn put_annotation(&mut self, name: &str, value: &Value) -> Result<(), StoreError>;

    /// Finalise the dataset and return its URI.
    fn freeze(self: Box<Self>) -> Result<String, StoreError>;
}

/// A frozen dataset
pub trait DataSetHandle: Send {
    fn uri(&self) -> &str;

    fn name(&self) -> &str;

    fn admin_metadata(&self) -> &AdminMetadata;

    fn update_name(&mut self, name: &str) -> Result<(), StoreError>;

    fn list_annotation_names(&self) -> Result<Vec<String>, StoreError>;

    fn get_annotation(&self, name: &str) -> Result<Value, StoreError>;

    fn put_annotation(&mut self, name: &str, value: &Value) -> Result<(), StoreError>;

    fn get_readme(&self) -> Result<String, StoreError>;

    fn put_readme(&mut self, content: &str) -> Result<(), StoreError>;

    /// Items sorted by relative path.
    fn items(&self) -> Result<Vec<ItemProperties>, StoreError>;

    /// Add a tag. Adding an existing tag does nothing.
    fn put_tag(&mut self, tag: &str) -> Result<(), StoreError>;

    /// Remove a tag. Removing an absent tag does nothing.
    fn delete_tag(&mut self, tag: &str) -> Result<(), StoreError>;

    fn list_tags(&self) -> Result<Vec<String>, StoreError>;
}

/// Check a dataset, annotation or tag name.
///
/// Names are limited to ASCII letters, digits, `-`, `_` and `.`.
pub fn validate_name(name: &str, max_length: Option<usize>) -> Result<(), StoreError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    let within_length = max_length.map_or(true, |max| name.len() <= max);

    if name.is_empty() || !valid_chars || !within_length || name == "." || name == ".." {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
