//! Dataset URI helpers
//!
//! Local datasets are addressed with `file://` URIs. Bare paths are accepted
//! wherever a URI is expected and are turned into absolute `file://` URIs.

use std::path::{Path, PathBuf};

use super::StoreError;

const FILE_SCHEME: &str = "file://";

/// Normalise a base URI or path into a `file://` URI with an absolute path.
///
/// URIs with any other scheme are returned unchanged.
pub fn sanitise_uri(uri: &str) -> String {
    if uri.contains("://") {
        return uri.trim_end_matches('/').to_string();
    }

    let path = Path::new(uri);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let text = absolute.to_string_lossy().replace('\\', "/");
    let text = text.trim_end_matches('/');
    if text.starts_with('/') {
        format!("{}{}", FILE_SCHEME, text)
    } else {
        format!("{}/{}", FILE_SCHEME, text)
    }
}

/// Resolve a local URI to a filesystem path.
pub fn local_path(uri: &str) -> Result<PathBuf, StoreError> {
    if let Some(rest) = uri.strip_prefix(FILE_SCHEME) {
        // `file://host/path` carries a host component before the path.
        let path = match rest.find('/') {
            Some(0) => rest,
            Some(i) => &rest[i..],
            None => return Err(StoreError::UnsupportedUri(uri.to_string())),
        };
        return Ok(PathBuf::from(path));
    }
    if uri.contains("://") {
        return Err(StoreError::UnsupportedUri(uri.to_string()));
    }
    Ok(PathBuf::from(uri))
}

/// The URI of a dataset named `name` in `base_uri`.
pub fn dataset_uri(base_uri: &str, name: &str) -> String {
    format!("{}/{}", sanitise_uri(base_uri), name)
}
