//! The owned state every handler runs against.

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    ConfigStore, HostError, Placement, RegistryError, StoreError, View, WindowDefaults, WindowHost,
    WindowId, WindowOptions, WindowRecord, WindowRegistry, MAIN_WINDOW_NAME,
};

/// Errors surfaced by session handlers.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Note '{0}' not found")]
    UnknownNote(String),

    #[error("Window {0} has no matching record")]
    UnknownWindow(WindowId),

    #[error("'{0}' is reserved for the main window")]
    ReservedName(String),
}

/// The persisted document, the live registry and the window host, owned together.
///
/// Handlers take `&mut self` and run to completion, so there is exactly one
/// writer at a time. Callers that share a session between threads must put it
/// behind a single owner (an event loop or a mutex).
pub struct Session<H> {
    pub(crate) store: ConfigStore,
    pub(crate) registry: WindowRegistry,
    pub(crate) host: H,
    pub(crate) defaults: WindowDefaults,
    pub(crate) main_window: Option<WindowId>,
}

impl<H: WindowHost> Session<H> {
    /// Create a session over a loaded store. No windows exist yet.
    ///
    /// Handle ids left in the document by a previous process are dropped.
    pub fn new(mut store: ConfigStore, host: H, defaults: WindowDefaults) -> Self {
        for record in &mut store.document_mut().windows {
            record.window_handle_id = None;
        }
        Self {
            store,
            registry: WindowRegistry::new(),
            host,
            defaults,
            main_window: None,
        }
    }

    /// The persisted-document store.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// The live note registry.
    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    /// The window host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The window host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Defaults applied to new windows.
    pub fn defaults(&self) -> &WindowDefaults {
        &self.defaults
    }

    /// Handle of the main window, while it exists.
    pub fn main_window(&self) -> Option<WindowId> {
        self.main_window
    }

    /// Whether `id` is a window this session created and still tracks.
    pub fn is_known_window(&self, id: WindowId) -> bool {
        self.main_window == Some(id) || self.store.find_index_by_handle(id).is_some()
    }

    /// Create the main window from its record, creating the record on first run.
    pub fn init_main_window(&mut self) -> Result<WindowId, SessionError> {
        let index = match self.store.find_index_by_name(MAIN_WINDOW_NAME) {
            Some(index) => index,
            None => {
                let windows = &mut self.store.document_mut().windows;
                windows.push(WindowRecord::new_main(&self.defaults));
                windows.len() - 1
            }
        };

        let options = self.options_for(index);
        let id = self.host.create_window(&options)?;
        self.place_once(index, id);

        let record = &mut self.store.document_mut().windows[index];
        record.window_handle_id = Some(id);
        let visible = record.is_open;
        self.main_window = Some(id);

        self.host.track_geometry(id);
        if visible {
            self.host.reveal_on_first_paint(id);
        } else {
            debug!("Main window {} starts hidden", id);
        }
        self.host.load_view(id, View::NoteList);

        info!("Main window created with handle {}", id);
        Ok(id)
    }

    /// Reopen every note that was open at last shutdown, in document order.
    pub fn restore_open_notes(&mut self) -> Result<Vec<String>, SessionError> {
        let names: Vec<String> = self
            .store
            .document()
            .notes()
            .filter(|w| w.is_open)
            .map(|w| w.name.clone())
            .collect();

        let mut restored = Vec::with_capacity(names.len());
        for name in names {
            if let crate::OpenOutcome::Opened(name) = self.open_or_focus(Some(name))? {
                restored.push(name);
            }
        }

        if !restored.is_empty() {
            info!("Restored {} open note(s)", restored.len());
        }
        Ok(restored)
    }

    /// Persist the document. Called on every exit path.
    pub fn quit(&mut self) -> Result<(), SessionError> {
        self.save()?;
        info!("Note config persisted for shutdown");
        Ok(())
    }

    /// Write the document to disk.
    pub fn save(&self) -> Result<(), SessionError> {
        self.store.save()?;
        Ok(())
    }

    /// Record index for a live handle, or an invariant error.
    pub(crate) fn index_for_handle(&self, id: WindowId) -> Result<usize, SessionError> {
        self.store.find_index_by_handle(id).ok_or_else(|| {
            error!("No window record for handle {}", id);
            SessionError::UnknownWindow(id)
        })
    }

    /// Window construction options derived from a record.
    pub(crate) fn options_for(&self, index: usize) -> WindowOptions {
        let record = &self.store.document().windows[index];
        WindowOptions {
            size: record
                .size
                .unwrap_or(self.defaults.min_size)
                .clamp(self.defaults.min_size, self.defaults.max_size),
            position: record.placement.position(),
            min_size: self.defaults.min_size,
            max_size: self.defaults.max_size,
            background_color: record.background_color.clone(),
        }
    }

    /// Center an unplaced window once and write its position back.
    pub(crate) fn place_once(&mut self, index: usize, id: WindowId) {
        if self.store.document().windows[index].placement.is_placed() {
            return;
        }

        self.host.center(id);
        if let Some(position) = self.host.position(id) {
            let record = &mut self.store.document_mut().windows[index];
            record.placement = Placement::PlacedAt(position);
            debug!(
                "Placed '{}' at ({}, {})",
                record.name, position.x, position.y
            );
        }
    }
}
