//! dtool-gui - create, list and annotate dtool datasets
//!
//! Command line front end over the dtool-gui core models.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dtool_gui_core::config::default_config_path;
use dtool_gui_core::metadata::render::plain;
use dtool_gui_core::{
    DataSetListModel, DataSetModel, DataSetStore, LocalBaseUriModel, LocalDataSetStore,
    MetadataModel, MetadataSchemaListModel, ModelError, ProtoDataSetModel,
};
use log::debug;

/// dtool-gui - create, list and annotate dtool datasets
#[derive(Parser, Debug)]
#[command(name = "dtool-gui")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the settings file (defaults to ~/.config/dtool/dtool.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show or change settings
    #[command(subcommand)]
    Config(ConfigCommands),

    /// List the available metadata schemas
    Schemas,

    /// List the datasets in the base URI
    #[command(alias = "list")]
    Ls {
        /// Print the dataset properties as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a dataset from the files in a directory
    Create {
        /// Dataset name
        name: String,

        /// Directory whose files become the dataset items
        input_dir: PathBuf,

        /// Metadata schema to describe the dataset with
        #[arg(long)]
        schema: Option<String>,

        /// Optional metadata item to include
        #[arg(long)]
        select: Vec<String>,

        /// Metadata value, as KEY=VALUE
        #[arg(long, value_parser = parse_key_value)]
        set: Vec<(String, String)>,
    },

    /// Show a dataset and its metadata
    Show {
        /// Dataset URI
        uri: String,
    },

    /// Update the metadata of a dataset
    Set {
        /// Dataset URI
        uri: String,

        /// Metadata values, as KEY=VALUE
        #[arg(required = true, value_parser = parse_key_value)]
        values: Vec<(String, String)>,
    },

    /// Rename a dataset
    Rename {
        /// Dataset URI
        uri: String,

        /// New name
        name: String,
    },

    /// Manage dataset tags
    Tag {
        /// Dataset URI
        uri: String,

        #[command(subcommand)]
        action: TagCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show or set the base URI datasets live in
    BaseUri {
        /// New base URI or directory
        uri: Option<String>,
    },

    /// Show or set the directory of metadata schemas
    SchemaDir {
        /// New schema directory
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum TagCommands {
    /// Add a tag
    Add { tag: String },

    /// Remove a tag
    Rm { tag: String },

    /// List tags
    Ls,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .init();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    debug!("Using settings file {}", config_path.display());
    let store: Arc<dyn DataSetStore> = Arc::new(LocalDataSetStore::new());

    match cli.command {
        Commands::Config(command) => config(&config_path, command),
        Commands::Schemas => {
            for name in MetadataSchemaListModel::new(&config_path).metadata_model_names()? {
                println!("{}", name);
            }
            Ok(())
        }
        Commands::Ls { json } => list(&config_path, store, json),
        Commands::Create {
            name,
            input_dir,
            schema,
            select,
            set,
        } => create(&config_path, store, name, input_dir, schema, &select, &set),
        Commands::Show { uri } => show(store, &uri),
        Commands::Set { uri, values } => set_metadata(store, &uri, &values),
        Commands::Rename { uri, name } => {
            let mut model = DataSetModel::new(store);
            model.load_dataset(&uri)?;
            model.update_name(&name)?;
            println!("Renamed {} to {}", uri, name);
            Ok(())
        }
        Commands::Tag { uri, action } => tag(store, &uri, action),
    }
}

fn config(config_path: &Path, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::BaseUri { uri } => {
            let model = LocalBaseUriModel::new(config_path);
            if let Some(uri) = uri {
                model.put_base_uri(&uri)?;
            }
            match model.get_base_uri()? {
                Some(uri) => println!("{}", uri),
                None => println!("(not set)"),
            }
        }
        ConfigCommands::SchemaDir { dir } => {
            let model = MetadataSchemaListModel::new(config_path);
            if let Some(dir) = dir {
                model.put_metadata_schema_directory(&dir)?;
            }
            match model.get_metadata_schema_directory()? {
                Some(dir) => println!("{}", dir.display()),
                None => println!("(not set)"),
            }
        }
    }
    Ok(())
}

fn list(config_path: &Path, store: Arc<dyn DataSetStore>, json: bool) -> Result<()> {
    let mut model = DataSetListModel::new(store);
    model.set_base_uri_model(LocalBaseUriModel::new(config_path))?;
    if model.base_uri()?.is_none() {
        bail!("No base URI configured; run `dtool-gui config base-uri <URI>` first");
    }

    let properties = model.properties()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&properties)?);
        return Ok(());
    }

    for info in properties {
        println!(
            "{}\t{}\t{} items\t{} bytes\t{}",
            info.name, info.creator, info.num_items, info.size_in_bytes, info.uri
        );
    }
    Ok(())
}

/// Print every validation issue, one line per field.
fn print_issues(metadata_model: &MetadataModel) {
    for (name, message) in metadata_model.issues() {
        eprintln!("  {}: {}", name, message);
    }
}

fn apply_values(metadata_model: &mut MetadataModel, values: &[(String, String)]) -> Result<()> {
    for (key, value) in values {
        metadata_model
            .set_value_from_str(key, value)
            .with_context(|| format!("Failed to set {}", key))?;
        if metadata_model.get_value(key).is_none() {
            bail!("Could not use '{}' as the value of {}", value, key);
        }
        metadata_model.select_optional_item(key);
    }
    Ok(())
}

fn create(
    config_path: &Path,
    store: Arc<dyn DataSetStore>,
    name: String,
    input_dir: PathBuf,
    schema: Option<String>,
    select: &[String],
    values: &[(String, String)],
) -> Result<()> {
    let mut metadata_model = match schema {
        Some(schema) => MetadataSchemaListModel::new(config_path)
            .get_metadata_model(&schema)
            .with_context(|| format!("Failed to load metadata schema {}", schema))?,
        None => MetadataModel::new(),
    };
    for item in select {
        metadata_model.select_optional_item(item);
    }
    apply_values(&mut metadata_model, values)?;

    let mut proto = ProtoDataSetModel::new(store);
    proto.set_name(name);
    proto.set_input_directory(&input_dir)?;
    proto.set_base_uri_model(LocalBaseUriModel::new(config_path));
    proto.set_metadata_model(metadata_model);

    match proto.create() {
        Ok(uri) => {
            println!("{}", uri);
            Ok(())
        }
        Err(e @ ModelError::MetadataValidation { .. }) => {
            if let Some(metadata_model) = proto.metadata_model() {
                print_issues(metadata_model);
            }
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn show(store: Arc<dyn DataSetStore>, uri: &str) -> Result<()> {
    let mut model = DataSetModel::new(store);
    model.load_dataset(uri)?;

    if let Some(admin) = model.admin_metadata() {
        println!("name:    {}", admin.name);
        println!("uuid:    {}", admin.uuid);
        println!("creator: {}", admin.creator_username);
        println!("created: {}", admin.created_at);
        if let Some(frozen_at) = admin.frozen_at {
            println!("frozen:  {}", frozen_at);
        }
    }

    let items = model.items()?;
    let size: u64 = items.iter().map(|i| i.size_in_bytes).sum();
    println!("items:   {} ({} bytes)", items.len(), size);

    let tags = model.list_tags()?;
    if !tags.is_empty() {
        println!("tags:    {}", tags.join(", "));
    }

    if let Some(metadata_model) = model.metadata_model() {
        println!("metadata:");
        for name in metadata_model.item_names() {
            let value = metadata_model
                .get_value(&name)
                .map_or_else(|| "(unset)".to_string(), plain);
            let marker = if metadata_model.required_item_names().contains(&name) {
                "*"
            } else {
                " "
            };
            println!("  {} {}: {}", marker, name, value);
        }
    }
    Ok(())
}

fn set_metadata(store: Arc<dyn DataSetStore>, uri: &str, values: &[(String, String)]) -> Result<()> {
    let mut model = DataSetModel::new(store);
    model.load_dataset(uri)?;

    let Some(metadata_model) = model.metadata_model_mut() else {
        bail!("Dataset {} has no metadata model", uri);
    };
    apply_values(metadata_model, values)?;

    if let Err(e) = model.update_metadata() {
        if let Some(metadata_model) = model.metadata_model() {
            print_issues(metadata_model);
        }
        return Err(e.into());
    }
    println!("Updated metadata of {}", uri);
    Ok(())
}

fn tag(store: Arc<dyn DataSetStore>, uri: &str, action: TagCommands) -> Result<()> {
    let mut model = DataSetModel::new(store);
    model.load_dataset(uri)?;

    match action {
        TagCommands::Add { tag } => model.put_tag(&tag)?,
        TagCommands::Rm { tag } => model.delete_tag(&tag)?,
        TagCommands::Ls => {
            for tag in model.list_tags()? {
                println!("{}", tag);
            }
        }
    }
    Ok(())
}
