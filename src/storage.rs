//! Shared sled plumbing for checkpoints and the session log.

use std::io;
use std::path::Path;

use crate::error::StorageError;

/// Open (or create) the sled database at `path`.
pub fn open_db(path: &Path) -> Result<sled::Db, StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    sled::open(path).map_err(to_storage_io)
}

pub(crate) fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

pub(crate) fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}
