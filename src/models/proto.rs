//! Building up and creating a new dataset

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use walkdir::WalkDir;

use super::{
    in_scope_values, summary_content, validate_metadata, LocalBaseUriModel, ModelError,
    METADATA_SCHEMA_ANNOTATION_NAME,
};
use crate::metadata::MetadataModel;
use crate::storage::DataSetStore;

/// Every file under `input_directory` with its `/`-separated relative path.
///
/// Symlinks to files count as files; symlinked directories are not entered.
fn path_handle_pairs(input_directory: &Path) -> Result<Vec<(PathBuf, String)>, ModelError> {
    let mut pairs = Vec::new();
    for entry in WalkDir::new(input_directory).sort_by_file_name() {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(input_directory) else {
            continue;
        };
        let handle = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        pairs.push((entry.path().to_path_buf(), handle));
    }
    Ok(pairs)
}

/// A dataset that has not been created yet
///
/// Collects a name, an input directory, a base URI model and a metadata model,
/// then creates the dataset in one step with [`create`](Self::create).
pub struct ProtoDataSetModel {
    store: Arc<dyn DataSetStore>,
    name: Option<String>,
    input_directory: Option<PathBuf>,
    base_uri_model: Option<LocalBaseUriModel>,
    metadata_model: Option<MetadataModel>,
    uri: Option<String>,
}

impl ProtoDataSetModel {
    pub fn new(store: Arc<dyn DataSetStore>) -> Self {
        Self {
            store,
            name: None,
            input_directory: None,
            base_uri_model: None,
            metadata_model: None,
            uri: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn input_directory(&self) -> Option<&Path> {
        self.input_directory.as_deref()
    }

    /// The configured base URI, if a base URI model is set and holds one.
    pub fn base_uri(&self) -> Result<Option<String>, ModelError> {
        match &self.base_uri_model {
            Some(model) => model.get_base_uri(),
            None => Ok(None),
        }
    }

    pub fn metadata_model(&self) -> Option<&MetadataModel> {
        self.metadata_model.as_ref()
    }

    pub fn metadata_model_mut(&mut self) -> Option<&mut MetadataModel> {
        self.metadata_model.as_mut()
    }

    /// URI of the created dataset, once [`create`](Self::create) has succeeded.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Set the directory whose files become the dataset's items.
    pub fn set_input_directory(&mut self, input_directory: impl AsRef<Path>) -> Result<(), ModelError> {
        let input_directory = input_directory.as_ref();
        if !input_directory.is_dir() {
            return Err(ModelError::DirectoryDoesNotExist(
                input_directory.to_path_buf(),
            ));
        }
        self.input_directory = Some(input_directory.to_path_buf());
        Ok(())
    }

    pub fn set_base_uri_model(&mut self, base_uri_model: LocalBaseUriModel) {
        self.base_uri_model = Some(base_uri_model);
    }

    pub fn set_metadata_model(&mut self, metadata_model: MetadataModel) {
        self.metadata_model = Some(metadata_model);
    }

    /// Create the dataset in the base URI and return its URI.
    ///
    /// Preconditions are checked in order (name, input directory, base URI
    /// model, metadata model, required metadata, valid metadata) and nothing
    /// is written unless all of them hold.
    pub fn create(&mut self) -> Result<String, ModelError> {
        let name = self.name.as_deref().ok_or(ModelError::MissingDataSetName)?;
        let input_directory = self
            .input_directory
            .as_deref()
            .ok_or(ModelError::MissingInputDirectory)?;
        let base_uri_model = self
            .base_uri_model
            .as_ref()
            .ok_or(ModelError::MissingBaseUriModel)?;
        let metadata_model = self
            .metadata_model
            .as_ref()
            .ok_or(ModelError::MissingMetadataModel)?;

        validate_metadata(metadata_model)?;

        let base_uri = base_uri_model
            .get_base_uri()?
            .ok_or(ModelError::BaseUriNotSet)?;
        let items = path_handle_pairs(input_directory)?;
        let values = in_scope_values(metadata_model);

        info!("Creating dataset {} in {}", name, base_uri);
        let mut creator = self.store.create(name, &base_uri)?;

        for (key, value) in &values {
            creator.put_annotation(key, value)?;
        }
        creator.put_readme(&summary_content(&values))?;
        creator.put_annotation(
            METADATA_SCHEMA_ANNOTATION_NAME,
            &metadata_model.get_master_schema(),
        )?;

        for (path, handle) in &items {
            creator.put_item(path, handle)?;
        }

        let uri = creator.freeze()?;
        info!("Created dataset {}", uri);
        self.uri = Some(uri.clone());
        Ok(uri)
    }
}
