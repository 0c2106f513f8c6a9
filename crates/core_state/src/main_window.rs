//! Main window behavior: the close/hide state machine and the note list.

use tracing::{debug, info};

use crate::{Session, SessionError, WindowHost, WindowId, MAIN_WINDOW_NAME};

/// What [`Session::close_or_hide`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// No note was live, so the window was closed outright. Nothing is left
    /// on screen and the process should quit.
    LastWindowClosed,
    /// The main window was hidden while notes stay open.
    MainHidden,
    /// A note window was closed and the main window revealed.
    NoteClosed,
}

/// One entry of the main window's note list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSummary {
    pub name: String,
    pub title: String,
    pub color: String,
}

impl<H: WindowHost> Session<H> {
    /// Handle a window's "close" action. Always persists the document.
    pub fn close_or_hide(&mut self, id: WindowId) -> Result<CloseOutcome, SessionError> {
        if !self.is_known_window(id) {
            return Err(SessionError::UnknownWindow(id));
        }

        let outcome = if self.registry.is_empty() {
            self.host.close(id);
            if self.main_window == Some(id) {
                self.main_window = None;
            }
            info!("Window {} closed with no notes open", id);
            CloseOutcome::LastWindowClosed
        } else if self.main_window == Some(id) {
            self.host.hide(id);
            if let Some(index) = self.store.find_index_by_name(MAIN_WINDOW_NAME) {
                self.store.document_mut().windows[index].is_open = false;
            }
            debug!("Main window hidden, {} note(s) stay open", self.registry.len());
            CloseOutcome::MainHidden
        } else {
            let index = self.index_for_handle(id)?;
            self.host.close(id);

            let record = &mut self.store.document_mut().windows[index];
            record.is_open = false;
            record.window_handle_id = None;
            let name = record.name.clone();
            self.registry.unregister(&name);

            if let Some(main_index) = self.store.find_index_by_name(MAIN_WINDOW_NAME) {
                self.store.document_mut().windows[main_index].is_open = true;
            }
            if let Some(main) = self.main_window {
                self.host.show(main);
            }
            info!("Note '{}' closed, main window revealed", name);
            CloseOutcome::NoteClosed
        };

        self.save()?;
        Ok(outcome)
    }

    /// Name, title and color of every note, in document order.
    pub fn list_notes(&self) -> Vec<NoteSummary> {
        self.store
            .document()
            .notes()
            .map(|record| NoteSummary {
                name: record.name.clone(),
                title: record.title.clone().unwrap_or_default(),
                color: record.background_color.clone(),
            })
            .collect()
    }
}
