//! Editing a frozen dataset

use std::sync::Arc;

use log::info;

use super::{
    in_scope_values, metadata_model_from_dataset, summary_content, validate_metadata, ModelError,
    METADATA_SCHEMA_ANNOTATION_NAME,
};
use crate::metadata::MetadataModel;
use crate::storage::{AdminMetadata, DataSetHandle, DataSetStore, ItemProperties};

/// A loaded dataset and the metadata model derived from it
pub struct DataSetModel {
    store: Arc<dyn DataSetStore>,
    dataset: Option<Box<dyn DataSetHandle>>,
    metadata_model: Option<MetadataModel>,
}

impl DataSetModel {
    pub fn new(store: Arc<dyn DataSetStore>) -> Self {
        Self {
            store,
            dataset: None,
            metadata_model: None,
        }
    }

    /// True when no dataset is loaded.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_none()
    }

    pub fn name(&self) -> Option<&str> {
        self.dataset.as_ref().map(|ds| ds.name())
    }

    pub fn uri(&self) -> Option<&str> {
        self.dataset.as_ref().map(|ds| ds.uri())
    }

    pub fn admin_metadata(&self) -> Option<&AdminMetadata> {
        self.dataset.as_ref().map(|ds| ds.admin_metadata())
    }

    pub fn metadata_model(&self) -> Option<&MetadataModel> {
        self.metadata_model.as_ref()
    }

    pub fn metadata_model_mut(&mut self) -> Option<&mut MetadataModel> {
        self.metadata_model.as_mut()
    }

    /// Detach from the loaded dataset.
    pub fn clear(&mut self) {
        self.dataset = None;
        self.metadata_model = None;
    }

    fn dataset(&self) -> Result<&dyn DataSetHandle, ModelError> {
        self.dataset.as_deref().ok_or(ModelError::NoDataSetLoaded)
    }

    fn dataset_mut(&mut self) -> Result<&mut Box<dyn DataSetHandle>, ModelError> {
        self.dataset.as_mut().ok_or(ModelError::NoDataSetLoaded)
    }

    /// Load a dataset and derive its metadata model.
    ///
    /// On failure the model is left empty.
    pub fn load_dataset(&mut self, uri: &str) -> Result<(), ModelError> {
        info!("Loading dataset from URI: {}", uri);
        self.clear();
        let dataset = self.store.open(uri)?;
        let metadata_model = metadata_model_from_dataset(dataset.as_ref())?;
        self.dataset = Some(dataset);
        self.metadata_model = Some(metadata_model);
        Ok(())
    }

    pub fn update_name(&mut self, name: &str) -> Result<(), ModelError> {
        info!("Renaming dataset to {}", name);
        self.dataset_mut()?.update_name(name)?;
        Ok(())
    }

    /// Write the in-scope metadata back to the dataset.
    ///
    /// Annotations, the summary and the schema annotation are all rewritten.
    pub fn update_metadata(&mut self) -> Result<(), ModelError> {
        let metadata_model = self
            .metadata_model
            .as_ref()
            .ok_or(ModelError::MissingMetadataModel)?;
        validate_metadata(metadata_model)?;

        let values = in_scope_values(metadata_model);
        let master_schema = metadata_model.get_master_schema();

        let dataset = self.dataset_mut()?;
        info!("Updating metadata of {}", dataset.uri());
        for (key, value) in &values {
            dataset.put_annotation(key, value)?;
        }
        dataset.put_readme(&summary_content(&values))?;
        dataset.put_annotation(METADATA_SCHEMA_ANNOTATION_NAME, &master_schema)?;
        Ok(())
    }

    pub fn items(&self) -> Result<Vec<ItemProperties>, ModelError> {
        Ok(self.dataset()?.items()?)
    }

    pub fn put_tag(&mut self, tag: &str) -> Result<(), ModelError> {
        self.dataset_mut()?.put_tag(tag)?;
        Ok(())
    }

    pub fn delete_tag(&mut self, tag: &str) -> Result<(), ModelError> {
        self.dataset_mut()?.delete_tag(tag)?;
        Ok(())
    }

    pub fn list_tags(&self) -> Result<Vec<String>, ModelError> {
        Ok(self.dataset()?.list_tags()?)
    }
}
