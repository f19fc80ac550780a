//! Local file system dataset store
//!
//! A dataset named `name` in base URI `file:///base` lives in `/base/name`:
//!
//! ```text
//! name/
//!   README.yml                  free-text summary
//!   data/<relpath>              item payloads
//!   .dtool/dtool                admin metadata (JSON)
//!   .dtool/manifest.json        item listing, written on freeze
//!   .dtool/annotations/<a>.json one file per annotation
//!   .dtool/tags/<tag>           one empty file per tag
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::uri::{dataset_uri, local_path, sanitise_uri};
use super::{
    validate_name, AdminMetadata, DataSetHandle, DataSetKind, DataSetStore, ItemProperties,
    ProtoDataSetHandle, StoreError,
};

const ADMIN_DIR: &str = ".dtool";
const ADMIN_FILE: &str = "dtool";
const MANIFEST_FILE: &str = "manifest.json";
const ANNOTATIONS_DIR: &str = "annotations";
const TAGS_DIR: &str = "tags";
const README_FILE: &str = "README.yml";
const DATA_DIR: &str = "data";

const MAX_NAME_LENGTH: usize = 80;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    hash_function: String,
    items: BTreeMap<String, ItemProperties>,
}

/// Write a value to disk as pretty JSON, creating parent directories.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let data = fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Writer that hashes everything passing through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn hex_digest(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Item identifier: a digest of the relative path.
fn item_identifier(relpath: &str) -> String {
    sha256_hex(relpath.as_bytes())
}

fn admin_path(root: &Path) -> PathBuf {
    root.join(ADMIN_DIR).join(ADMIN_FILE)
}

/// Sorted file names in `dir`, or nothing if it does not exist.
fn file_names(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut names = Vec::new();
    if !dir.exists() {
        return Ok(names);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Reject item paths that are absolute or escape the data directory.
fn check_relpath(relpath: &str) -> Result<(), StoreError> {
    let path = Path::new(relpath);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if relpath.is_empty() || escapes {
        return Err(StoreError::InvalidItemPath(relpath.to_string()));
    }
    Ok(())
}

/// A store of datasets on the local file system
#[derive(Clone, Debug)]
pub struct LocalDataSetStore {
    creator_username: String,
}

impl LocalDataSetStore {
    /// Create a store that records the current user as dataset creator.
    pub fn new() -> Self {
        let creator_username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self::with_creator(creator_username)
    }

    pub fn with_creator(creator_username: impl Into<String>) -> Self {
        Self {
            creator_username: creator_username.into(),
        }
    }
}

impl Default for LocalDataSetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSetStore for LocalDataSetStore {
    fn create(&self, name: &str, base_uri: &str) -> Result<Box<dyn ProtoDataSetHandle>, StoreError> {
        validate_name(name, Some(MAX_NAME_LENGTH))?;

        let base_uri = sanitise_uri(base_uri);
        let base_path = local_path(&base_uri)?;
        if !base_path.is_dir() {
            return Err(StoreError::NotFound(base_uri));
        }

        let root = base_path.join(name);
        let uri = dataset_uri(&base_uri, name);
        if root.exists() {
            return Err(StoreError::AlreadyExists(uri));
        }

        let admin = AdminMetadata {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            kind: DataSetKind::ProtoDataSet,
            creator_username: self.creator_username.clone(),
            created_at: Utc::now(),
            frozen_at: None,
        };

        fs::create_dir_all(root.join(DATA_DIR))?;
        fs::create_dir_all(root.join(ADMIN_DIR).join(ANNOTATIONS_DIR))?;
        fs::create_dir_all(root.join(ADMIN_DIR).join(TAGS_DIR))?;
        write_json(&admin_path(&root), &admin)?;
        fs::write(root.join(README_FILE), "")?;

        info!("Created proto dataset {} ({})", uri, admin.uuid);
        Ok(Box::new(LocalProtoDataSet {
            root,
            uri,
            admin,
            manifest: Manifest {
                hash_function: "sha256".to_string(),
                items: BTreeMap::new(),
            },
            frozen: false,
        }))
    }

    fn open(&self, uri: &str) -> Result<Box<dyn DataSetHandle>, StoreError> {
        Ok(Box::new(LocalDataSet::open(uri)?))
    }

    fn list(&self, base_uri: &str) -> Result<Vec<Box<dyn DataSetHandle>>, StoreError> {
        let base_uri = sanitise_uri(base_uri);
        let base_path = local_path(&base_uri)?;

        let mut datasets: Vec<LocalDataSet> = Vec::new();
        if !base_path.is_dir() {
            warn!("Base URI {} is not a directory", base_uri);
            return Ok(Vec::new());
        }

        for entry in fs::read_dir(&base_path)? {
            let path = entry?.path();
            if !admin_path(&path).is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match LocalDataSet::open(&dataset_uri(&base_uri, name)) {
                Ok(dataset) => datasets.push(dataset),
                Err(StoreError::NotFrozen(uri)) => debug!("Skipping proto dataset {}", uri),
                Err(e) => return Err(e),
            }
        }

        datasets.sort_by(|a, b| a.admin.name.cmp(&b.admin.name));
        Ok(datasets
            .into_iter()
            .map(|ds| Box::new(ds) as Box<dyn DataSetHandle>)
            .collect())
    }
}

/// A dataset being built on disk
struct LocalProtoDataSet {
    root: PathBuf,
    uri: String,
    admin: AdminMetadata,
    manifest: Manifest,
    frozen: bool,
}

impl ProtoDataSetHandle for LocalProtoDataSet {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn put_item(&mut self, source: &Path, relpath: &str) -> Result<(), StoreError> {
        check_relpath(relpath)?;

        let mut input = fs::File::open(source)?;
        let dest = self.root.join(DATA_DIR).join(relpath);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut output = HashingWriter::new(fs::File::create(&dest)?);
        let size_in_bytes = io::copy(&mut input, &mut output)?;
        output.flush()?;

        let properties = ItemProperties {
            relpath: relpath.to_string(),
            size_in_bytes,
            hash: output.hex_digest(),
        };
        debug!("Added item {} to {}", relpath, self.uri);
        self.manifest
            .items
            .insert(item_identifier(relpath), properties);
        Ok(())
    }

    fn put_readme(&mut self, content: &str) -> Result<(), StoreError> {
        fs::write(self.root.join(README_FILE), content)?;
        Ok(())
    }

    fn put_annotation(&mut self, name: &str, value: &Value) -> Result<(), StoreError> {
        write_annotation(&self.root, name, value)
    }

    fn freeze(mut self: Box<Self>) -> Result<String, StoreError> {
        write_json(
            &self.root.join(ADMIN_DIR).join(MANIFEST_FILE),
            &self.manifest,
        )?;

        self.admin.kind = DataSetKind::DataSet;
        self.admin.frozen_at = Some(Utc::now());
        write_json(&admin_path(&self.root), &self.admin)?;
        self.frozen = true;

        info!(
            "Froze dataset {} with {} items",
            self.uri,
            self.manifest.items.len()
        );
        Ok(self.uri.clone())
    }
}

impl Drop for LocalProtoDataSet {
    fn drop(&mut self) {
        if self.frozen {
            return;
        }
        warn!("Abandoning proto dataset {}", self.uri);
        if let Err(e) = fs::remove_dir_all(&self.root) {
            warn!("Could not remove {}: {}", self.root.display(), e);
        }
    }
}

fn write_annotation(root: &Path, name: &str, value: &Value) -> Result<(), StoreError> {
    validate_name(name, Some(MAX_NAME_LENGTH))?;
    let path = root
        .join(ADMIN_DIR)
        .join(ANNOTATIONS_DIR)
        .join(format!("{}.json", name));
    write_json(&path, value)
}

/// A frozen dataset on disk
struct LocalDataSet {
    root: PathBuf,
    uri: String,
    admin: AdminMetadata,
}

impl LocalDataSet {
    fn open(uri: &str) -> Result<Self, StoreError> {
        let uri = sanitise_uri(uri);
        let root = local_path(&uri)?;
        let admin_file = admin_path(&root);
        if !admin_file.is_file() {
            return Err(StoreError::NotFound(uri));
        }

        let admin: AdminMetadata = read_json(&admin_file)?;
        if admin.kind != DataSetKind::DataSet {
            return Err(StoreError::NotFrozen(uri));
        }
        Ok(Self { root, uri, admin })
    }

    fn annotations_dir(&self) -> PathBuf {
        self.root.join(ADMIN_DIR).join(ANNOTATIONS_DIR)
    }

    fn tags_dir(&self) -> PathBuf {
        self.root.join(ADMIN_DIR).join(TAGS_DIR)
    }
}

impl DataSetHandle for LocalDataSet {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn name(&self) -> &str {
        &self.admin.name
    }

    fn admin_metadata(&self) -> &AdminMetadata {
        &self.admin
    }

    fn update_name(&mut self, name: &str) -> Result<(), StoreError> {
        validate_name(name, Some(MAX_NAME_LENGTH))?;
        let mut admin = self.admin.clone();
        admin.name = name.to_string();
        write_json(&admin_path(&self.root), &admin)?;
        self.admin = admin;
        Ok(())
    }

    fn list_annotation_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(file_names(&self.annotations_dir())?
            .into_iter()
            .filter_map(|f| f.strip_suffix(".json").map(str::to_string))
            .collect())
    }

    fn get_annotation(&self, name: &str) -> Result<Value, StoreError> {
        validate_name(name, Some(MAX_NAME_LENGTH))?;
        let path = self.annotations_dir().join(format!("{}.json", name));
        if !path.is_file() {
            return Err(StoreError::AnnotationNotFound(name.to_string()));
        }
        read_json(&path)
    }

    fn put_annotation(&mut self, name: &str, value: &Value) -> Result<(), StoreError> {
        write_annotation(&self.root, name, value)
    }

    fn get_readme(&self) -> Result<String, StoreError> {
        let path = self.root.join(README_FILE);
        if !path.is_file() {
            return Ok(String::new());
        }
        Ok(fs::read_to_string(path)?)
    }

    fn put_readme(&mut self, content: &str) -> Result<(), StoreError> {
        fs::write(self.root.join(README_FILE), content)?;
        Ok(())
    }

    fn items(&self) -> Result<Vec<ItemProperties>, StoreError> {
        let manifest: Manifest = read_json(&self.root.join(ADMIN_DIR).join(MANIFEST_FILE))?;
        let mut items: Vec<ItemProperties> = manifest.items.into_values().collect();
        items.sort_by(|a, b| a.relpath.cmp(&b.relpath));
        Ok(items)
    }

    fn put_tag(&mut self, tag: &str) -> Result<(), StoreError> {
        validate_name(tag, None)?;
        let dir = self.tags_dir();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(tag), "")?;
        Ok(())
    }

    fn delete_tag(&mut self, tag: &str) -> Result<(), StoreError> {
        validate_name(tag, None)?;
        let path = self.tags_dir().join(tag);
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn list_tags(&self) -> Result<Vec<String>, StoreError> {
        file_names(&self.tags_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_uri(dir: &Path) -> String {
        sanitise_uri(&dir.to_string_lossy())
    }

    fn make_dataset(store: &LocalDataSetStore, base: &str, name: &str) -> String {
        let source = tempfile::NamedTempFile::new().unwrap();
        fs::write(source.path(), "hello").unwrap();

        let mut proto = store.create(name, base).unwrap();
        proto.put_item(source.path(), "sub/hello.txt").unwrap();
        proto.put_readme("---\nproject: test").unwrap();
        proto.put_annotation("project", &json!("test")).unwrap();
        proto.freeze().unwrap()
    }

    #[test]
    fn test_create_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let base = base_uri(dir.path());
        let store = LocalDataSetStore::with_creator("tester");

        let uri = make_dataset(&store, &base, "my-dataset");
        assert_eq!(uri, format!("{}/my-dataset", base));

        let dataset = store.open(&uri).unwrap();
        assert_eq!(dataset.name(), "my-dataset");
        assert_eq!(dataset.admin_metadata().creator_username, "tester");
        assert!(dataset.admin_metadata().frozen_at.is_some());
        assert_eq!(dataset.get_readme().unwrap(), "---\nproject: test");
        assert_eq!(dataset.get_annotation("project").unwrap(), json!("test"));
        assert_eq!(dataset.list_annotation_names().unwrap(), vec!["project"]);

        let items = dataset.items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].relpath, "sub/hello.txt");
        assert_eq!(items[0].size_in_bytes, 5);
        assert_eq!(items[0].hash, sha256_hex(b"hello"));
        assert!(dir.path().join("my-dataset/data/sub/hello.txt").is_file());
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let base = base_uri(dir.path());
        let store = LocalDataSetStore::with_creator("tester");

        assert!(matches!(
            store.create("bad name", &base),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.create("ds", &base_uri(&dir.path().join("missing"))),
            Err(StoreError::NotFound(_))
        ));

        make_dataset(&store, &base, "ds");
        assert!(matches!(
            store.create("ds", &base),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_put_item_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDataSetStore::with_creator("tester");
        let source = tempfile::NamedTempFile::new().unwrap();

        let mut proto = store.create("ds", &base_uri(dir.path())).unwrap();
        assert!(proto.put_item(source.path(), "../escape.txt").is_err());
        assert!(proto.put_item(source.path(), "/etc/passwd").is_err());
        assert!(proto.put_item(source.path(), "").is_err());
    }

    #[test]
    fn test_abandoned_proto_dataset_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDataSetStore::with_creator("tester");
        {
            let _proto = store.create("ds", &base_uri(dir.path())).unwrap();
            assert!(dir.path().join("ds").is_dir());
        }
        assert!(!dir.path().join("ds").exists());
    }

    #[test]
    fn test_update_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDataSetStore::with_creator("tester");
        let uri = make_dataset(&store, &base_uri(dir.path()), "ds");

        let mut dataset = store.open(&uri).unwrap();
        dataset.update_name("renamed").unwrap();
        assert!(dataset.update_name("not valid").is_err());
        assert_eq!(dataset.name(), "renamed");

        assert_eq!(store.open(&uri).unwrap().name(), "renamed");
    }

    #[test]
    fn test_tags() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDataSetStore::with_creator("tester");
        let uri = make_dataset(&store, &base_uri(dir.path()), "ds");

        let mut dataset = store.open(&uri).unwrap();
        assert!(dataset.list_tags().unwrap().is_empty());

        dataset.put_tag("raw").unwrap();
        dataset.put_tag("raw").unwrap();
        dataset.put_tag("images").unwrap();
        assert_eq!(dataset.list_tags().unwrap(), vec!["images", "raw"]);

        dataset.delete_tag("raw").unwrap();
        dataset.delete_tag("raw").unwrap();
        dataset.delete_tag("never-added").unwrap();
        assert_eq!(dataset.list_tags().unwrap(), vec!["images"]);
    }

    #[test]
    fn test_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDataSetStore::with_creator("tester");
        let uri = make_dataset(&store, &base_uri(dir.path()), "ds");

        let mut dataset = store.open(&uri).unwrap();
        dataset.put_annotation("age", &json!(10)).unwrap();
        dataset.put_annotation("project", &json!("other")).unwrap();

        assert_eq!(dataset.list_annotation_names().unwrap(), vec!["age", "project"]);
        assert_eq!(dataset.get_annotation("project").unwrap(), json!("other"));
        assert!(matches!(
            dataset.get_annotation("missing"),
            Err(StoreError::AnnotationNotFound(_))
        ));
    }

    #[test]
    fn test_annotation_names_cannot_leave_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDataSetStore::with_creator("tester");
        let uri = make_dataset(&store, &base_uri(dir.path()), "ds");
        fs::write(dir.path().join("outside.json"), "1").unwrap();

        let dataset = store.open(&uri).unwrap();
        assert!(matches!(
            dataset.get_annotation("../../../outside"),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_large_item_is_hashed_while_copied() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDataSetStore::with_creator("tester");
        let data: Vec<u8> = (0..3 * 1024 * 1024 + 17).map(|i| (i % 251) as u8).collect();
        let source = tempfile::NamedTempFile::new().unwrap();
        fs::write(source.path(), &data).unwrap();

        let mut proto = store.create("big", &base_uri(dir.path())).unwrap();
        proto.put_item(source.path(), "big.bin").unwrap();
        let uri = proto.freeze().unwrap();

        let items = store.open(&uri).unwrap().items().unwrap();
        assert_eq!(items[0].size_in_bytes, data.len() as u64);
        assert_eq!(items[0].hash, sha256_hex(&data));
        assert_eq!(fs::read(dir.path().join("big/data/big.bin")).unwrap(), data);
    }

    #[test]
    fn test_list_skips_proto_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let base = base_uri(dir.path());
        let store = LocalDataSetStore::with_creator("tester");

        make_dataset(&store, &base, "b-dataset");
        make_dataset(&store, &base, "a-dataset");
        let _pending = store.create("c-dataset", &base).unwrap();
        fs::create_dir(dir.path().join("not-a-dataset")).unwrap();

        let names: Vec<String> = store
            .list(&base)
            .unwrap()
            .iter()
            .map(|ds| ds.name().to_string())
            .collect();
        assert_eq!(names, vec!["a-dataset", "b-dataset"]);

        assert!(matches!(
            store.open(&format!("{}/c-dataset", base)),
            Err(StoreError::NotFrozen(_))
        ));
    }
}
