// dtool-gui core - Metadata models and dataset facades for dtool datasets

pub mod config;
pub mod metadata;
pub mod models;
pub mod storage;

pub use metadata::{MetadataError, MetadataModel, SchemaError, SchemaItem, SchemaType};
pub use models::{
    DataSetListModel, DataSetModel, LocalBaseUriModel, MetadataSchemaListModel, ModelError,
    ProtoDataSetModel,
};
pub use storage::{DataSetStore, LocalDataSetStore, StoreError};
