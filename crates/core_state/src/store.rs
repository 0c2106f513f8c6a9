//! Loading and saving the persisted document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::{Document, WindowId};

/// Errors from reading or writing the persisted document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Owns the persisted document and the file it lives in.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    document: Document,
}

impl ConfigStore {
    /// Load the document at `path`, creating an empty one on first run.
    ///
    /// A file that exists but does not parse is an error and is left untouched.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if !path.exists() {
            let store = Self::with_document(path, Document::default());
            store.save()?;
            info!("Created empty note config at {}", store.path.display());
            return Ok(store);
        }

        let json = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let document: Document =
            serde_json::from_str(&json).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?;

        info!(
            "Loaded {} window record(s) from {}",
            document.windows.len(),
            path.display()
        );
        Ok(Self { path, document })
    }

    /// Wrap an already-built document without touching the filesystem.
    pub fn with_document(path: impl Into<PathBuf>, document: Document) -> Self {
        Self {
            path: path.into(),
            document,
        }
    }

    /// Overwrite the file with the full in-memory document.
    ///
    /// Writes to a sibling temp file and renames it over the target, so an
    /// interrupted save leaves the previous document intact.
    pub fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).map_err(|source| StoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!("Note config saved to {}", self.path.display());
        Ok(())
    }

    /// Path of the persisted file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The in-memory document, mutably.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Index of the record named `name`.
    pub fn find_index_by_name(&self, name: &str) -> Option<usize> {
        self.document.find_index_by_name(name)
    }

    /// Index of the record whose live handle is `id`.
    pub fn find_index_by_handle(&self, id: WindowId) -> Option<usize> {
        self.document.find_index_by_handle(id)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
