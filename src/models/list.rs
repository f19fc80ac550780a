//! The datasets in a base URI

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use uuid::Uuid;

use super::{LocalBaseUriModel, ModelError};
use crate::storage::{DataSetHandle, DataSetStore};

/// Summary properties of one dataset, as shown in a dataset listing
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataSetInfo {
    pub name: String,
    pub uri: String,
    pub uuid: Uuid,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub frozen_at: Option<DateTime<Utc>>,
    pub num_items: usize,
    pub size_in_bytes: u64,
}

/// Index of the frozen datasets under the configured base URI
pub struct DataSetListModel {
    store: Arc<dyn DataSetStore>,
    base_uri_model: Option<LocalBaseUriModel>,
    datasets: Vec<Box<dyn DataSetHandle>>,
}

impl DataSetListModel {
    pub fn new(store: Arc<dyn DataSetStore>) -> Self {
        Self {
            store,
            base_uri_model: None,
            datasets: Vec::new(),
        }
    }

    pub fn base_uri(&self) -> Result<Option<String>, ModelError> {
        match &self.base_uri_model {
            Some(model) => model.get_base_uri(),
            None => Ok(None),
        }
    }

    /// Set the base URI model, indexing its base URI if one is configured.
    pub fn set_base_uri_model(&mut self, base_uri_model: LocalBaseUriModel) -> Result<(), ModelError> {
        self.base_uri_model = Some(base_uri_model);
        if self.base_uri()?.is_some() {
            self.reindex()?;
        }
        Ok(())
    }

    /// Re-read the datasets in the base URI.
    pub fn reindex(&mut self) -> Result<(), ModelError> {
        self.datasets.clear();
        let Some(base_uri) = self.base_uri()? else {
            return Ok(());
        };
        self.datasets = self.store.list(&base_uri)?;
        info!("Indexed {} datasets in {}", self.datasets.len(), base_uri);
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.datasets.iter().map(|ds| ds.name().to_string()).collect()
    }

    pub fn uris(&self) -> Vec<String> {
        self.datasets.iter().map(|ds| ds.uri().to_string()).collect()
    }

    /// URI of the dataset at `index` in the listing.
    pub fn get_uri(&self, index: usize) -> Option<&str> {
        self.datasets.get(index).map(|ds| ds.uri())
    }

    pub fn properties(&self) -> Result<Vec<DataSetInfo>, ModelError> {
        self.datasets
            .iter()
            .map(|ds| {
                let items = ds.items()?;
                let admin = ds.admin_metadata();
                Ok(DataSetInfo {
                    name: admin.name.clone(),
                    uri: ds.uri().to_string(),
                    uuid: admin.uuid,
                    creator: admin.creator_username.clone(),
                    created_at: admin.created_at,
                    frozen_at: admin.frozen_at,
                    num_items: items.len(),
                    size_in_bytes: items.iter().map(|i| i.size_in_bytes).sum(),
                })
            })
            .collect()
    }
}
