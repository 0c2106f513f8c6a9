//! Runtime map from note name to live window handle.

use std::collections::HashMap;

use thiserror::Error;

use crate::{Document, WindowId};

/// Errors from registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Note '{0}' already has a live window")]
    AlreadyLive(String),

    #[error("No window record has handle {0}")]
    UnknownHandle(WindowId),
}

/// Live note windows, keyed by note name.
///
/// Only notes are registered; the main window is tracked by the session.
#[derive(Debug, Default, Clone)]
pub struct WindowRegistry {
    live: HashMap<String, WindowId>,
}

impl WindowRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live handle for `name`, if its window is open.
    pub fn resolve(&self, name: &str) -> Option<WindowId> {
        self.live.get(name).copied()
    }

    /// The record name owning handle `id`.
    pub fn resolve_name<'a>(
        &self,
        document: &'a Document,
        id: WindowId,
    ) -> Result<&'a str, RegistryError> {
        document
            .find_index_by_handle(id)
            .map(|index| document.windows[index].name.as_str())
            .ok_or(RegistryError::UnknownHandle(id))
    }

    /// Record `id` as the live window for `name`.
    pub fn register(&mut self, name: &str, id: WindowId) -> Result<(), RegistryError> {
        if self.live.contains_key(name) {
            return Err(RegistryError::AlreadyLive(name.to_string()));
        }
        self.live.insert(name.to_string(), id);
        Ok(())
    }

    /// Drop the live mapping for `name`. Idempotent.
    pub fn unregister(&mut self, name: &str) -> Option<WindowId> {
        self.live.remove(name)
    }

    /// Number of live note windows.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no note window is live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
