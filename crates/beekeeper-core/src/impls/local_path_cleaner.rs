//! Cleaner for paths on the local filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::HousekeepingEntry;
use crate::ports::{Cleaner, CleanupError};

const FILE_SCHEME: &str = "file://";

/// Deletes the directory tree or file an entry's path points at.
///
/// Accepts `file:///abs/path` and plain paths. A path that is already gone
/// counts as deleted.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPathCleaner;

impl LocalPathCleaner {
    pub fn new() -> Self {
        Self
    }
}

/// Maps a location string to a local path, rejecting other URI schemes.
pub(crate) fn local_path(location: &str) -> Result<PathBuf, CleanupError> {
    if let Some(rest) = location.strip_prefix(FILE_SCHEME) {
        return Ok(PathBuf::from(rest));
    }
    if location.contains("://") {
        return Err(CleanupError::UnsupportedScheme(location.to_string()));
    }
    Ok(PathBuf::from(location))
}

/// Removes `path` whether it is a file or a directory.
pub(crate) async fn remove_path(path: &Path, location: &str) -> Result<(), CleanupError> {
    let io_error = |source| CleanupError::Io {
        location: location.to_string(),
        source,
    };

    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(location, "already absent");
            return Ok(());
        }
        Err(err) => return Err(io_error(err)),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    match result {
        Ok(()) => Ok(()),
        // Raced with another deleter.
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(err)),
    }
}

#[async_trait]
impl Cleaner for LocalPathCleaner {
    async fn cleanup(&self, entry: &HousekeepingEntry) -> Result<(), CleanupError> {
        let location = entry
            .path()
            .ok_or_else(|| CleanupError::MissingLocation(entry.location()))?;
        let path = local_path(location)?;
        remove_path(&path, location).await
    }
}
