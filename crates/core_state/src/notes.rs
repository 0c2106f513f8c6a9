//! Note window lifecycle: open-or-focus, geometry, title, color, content, delete.

use tracing::{debug, info};

use crate::{
    Notification, Placement, Session, SessionError, View, WindowHost, WindowId, WindowRecord,
    MAIN_WINDOW_NAME,
};

const DELETE_TITLE: &str = "Confirm Delete";
const DELETE_MESSAGE: &str = "Are you sure you want to delete the note?";

/// Result of [`Session::open_or_focus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new window was created for this note.
    Opened(String),
    /// The note already had a live window, which was focused instead.
    AlreadyOpen,
}

/// What a note's editor needs to render itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSnapshot {
    pub color: String,
    pub title: String,
    pub content: String,
}

impl<H: WindowHost> Session<H> {
    /// Open the note `name`, or focus its window if it is already live.
    ///
    /// Without a name a fresh `note<N>` is synthesized. The window's UI loads
    /// in the background; it is not ready when this returns.
    pub fn open_or_focus(&mut self, name: Option<String>) -> Result<OpenOutcome, SessionError> {
        let name = match name {
            Some(name) if name == MAIN_WINDOW_NAME => {
                return Err(SessionError::ReservedName(name));
            }
            Some(name) => name,
            None => self.store.document().next_default_name(),
        };

        if let Some(id) = self.registry.resolve(&name) {
            debug!("Note '{}' already open as window {}, focusing", name, id);
            self.host.focus(id);
            return Ok(OpenOutcome::AlreadyOpen);
        }

        let (index, created) = match self.store.find_index_by_name(&name) {
            Some(index) => (index, false),
            None => {
                let windows = &mut self.store.document_mut().windows;
                windows.push(WindowRecord::new_note(name.clone(), &self.defaults));
                (windows.len() - 1, true)
            }
        };

        let options = self.options_for(index);
        let id = match self.host.create_window(&options) {
            Ok(id) => id,
            Err(e) => {
                if created {
                    // The record was pushed last, so it is still at `index`
                    self.store.document_mut().windows.remove(index);
                }
                return Err(e.into());
            }
        };
        if created {
            info!("Created record for new note '{}'", name);
        }
        self.registry.register(&name, id)?;
        self.place_once(index, id);

        let record = &mut self.store.document_mut().windows[index];
        record.is_open = true;
        record.window_handle_id = Some(id);

        self.host.track_geometry(id);
        self.host.reveal_on_first_paint(id);
        self.host.load_view(id, View::NoteEditor);

        info!("Opened note '{}' in window {}", name, id);
        Ok(OpenOutcome::Opened(name))
    }

    /// Copy a window's current size and position into its record.
    ///
    /// Runs on every move and resize event, main window included. Each call
    /// carries the full current geometry, so the last one wins.
    pub fn persist_geometry(&mut self, id: WindowId) -> Result<(), SessionError> {
        let index = self.index_for_handle(id)?;
        let size = self.host.size(id);
        let position = self.host.position(id);

        let record = &mut self.store.document_mut().windows[index];
        if let Some(size) = size {
            record.size = Some(size);
        }
        if let Some(position) = position {
            record.placement = Placement::PlacedAt(position);
        }
        Ok(())
    }

    /// Delete a note after the user confirms.
    ///
    /// Returns `false` and changes nothing when the user declines.
    pub async fn delete_note(&mut self, name: &str) -> Result<bool, SessionError> {
        if name == MAIN_WINDOW_NAME {
            return Err(SessionError::ReservedName(name.to_string()));
        }
        if self.store.find_index_by_name(name).is_none() {
            return Err(SessionError::UnknownNote(name.to_string()));
        }

        let parent = self.main_window;
        if !self.host.confirm(parent, DELETE_TITLE, DELETE_MESSAGE).await {
            debug!("Delete of '{}' declined", name);
            return Ok(false);
        }

        if let Some(id) = self.registry.unregister(name) {
            self.host.close(id);
        }
        // Re-resolved after the prompt
        if let Some(index) = self.store.find_index_by_name(name) {
            self.store.document_mut().windows.remove(index);
        }
        self.save()?;

        info!("Deleted note '{}'", name);
        Ok(true)
    }

    /// Change a note's background and tell the main window's list about it.
    pub fn set_background(&mut self, id: WindowId, color: &str) -> Result<(), SessionError> {
        let index = self.index_for_handle(id)?;
        let record = &mut self.store.document_mut().windows[index];
        record.background_color = color.to_string();
        let name = record.name.clone();

        self.host.set_background_color(id, color);

        if let Some(main) = self.main_window {
            self.host.notify(
                main,
                Notification::NoteColorChanged {
                    color: color.to_string(),
                    name,
                },
            );
        }
        Ok(())
    }

    /// Rename a note from the list view, keeping its open editor in sync.
    pub fn set_title(&mut self, title: &str, name: &str) -> Result<(), SessionError> {
        if name == MAIN_WINDOW_NAME {
            return Err(SessionError::ReservedName(name.to_string()));
        }
        let index = self
            .store
            .find_index_by_name(name)
            .ok_or_else(|| SessionError::UnknownNote(name.to_string()))?;

        if let Some(id) = self.registry.resolve(name) {
            self.host.notify(
                id,
                Notification::NoteTitleChanged {
                    title: title.to_string(),
                },
            );
        }

        self.store.document_mut().windows[index].title = Some(title.to_string());
        Ok(())
    }

    /// Color, title and content for the window `id`.
    ///
    /// The color comes from the live window when it reports one.
    pub fn snapshot(&self, id: WindowId) -> Result<NoteSnapshot, SessionError> {
        let index = self.index_for_handle(id)?;
        let record = &self.store.document().windows[index];

        let color = self
            .host
            .background_color(id)
            .unwrap_or_else(|| record.background_color.clone())
            .to_lowercase();

        Ok(NoteSnapshot {
            color,
            title: record.title.clone().unwrap_or_default(),
            content: record.content.clone().unwrap_or_default(),
        })
    }

    /// Store the editor's content blob as-is.
    pub fn save_content(&mut self, id: WindowId, content: String) -> Result<(), SessionError> {
        let index = self.index_for_handle(id)?;
        self.store.document_mut().windows[index].content = Some(content);
        Ok(())
    }
}
