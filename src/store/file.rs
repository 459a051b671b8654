//! On-disk JSON documents.
//!
//! Each document `<name>.json` has a sidecar `<name>.json.lock`. Writers take
//! an exclusive OS advisory lock on the sidecar and hold it until the
//! [`FileWriter`] is dropped. The data file itself is never locked, so readers
//! never block.

use log::{debug, warn};
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use super::{Document, DocumentStore, DocumentWriter, StoreError};

#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path(&self, doc: Document) -> PathBuf {
        self.data_dir.join(doc.file_name())
    }

    fn lock_path(&self, doc: Document) -> PathBuf {
        self.data_dir.join(format!("{}.lock", doc.file_name()))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl DocumentStore for FileStore {
    fn read(&self, doc: Document) -> Value {
        let path = self.path(doc);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("⚠️  Failed to read {}: {}", path.display(), e);
                }
                return doc.empty();
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("⚠️  {} is not valid JSON, treating as empty: {}", path.display(), e);
                doc.empty()
            }
        }
    }

    fn lock(&self, doc: Document) -> Result<Box<dyn DocumentWriter + '_>, StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| io_error(&self.data_dir, e))?;

        let lock_path = self.lock_path(doc);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| io_error(&lock_path, e))?;

        lock_file.lock().map_err(|e| io_error(&lock_path, e))?;
        debug!("🔒 Locked {}", doc.file_name());

        Ok(Box::new(FileWriter {
            doc,
            path: self.path(doc),
            _lock: lock_file,
        }))
    }
}

/// Holds the sidecar lock. Closing the handle releases it.
pub struct FileWriter {
    doc: Document,
    path: PathBuf,
    _lock: File,
}

impl DocumentWriter for FileWriter {
    fn document(&self) -> Document {
        self.doc
    }

    fn write(&mut self, value: &Value) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let content = serde_json::to_string_pretty(value)?;
        fs::write(&self.path, content).map_err(|e| io_error(&self.path, e))?;

        debug!("💾 Wrote {}", self.path.display());
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        debug!("🔓 Unlocked {}", self.doc.file_name());
    }
}
