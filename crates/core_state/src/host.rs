//! The seam between the state core and whatever actually draws windows.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Point, Size, WindowId};

/// The host could not carry out a window operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Window host failure: {0}")]
pub struct HostError(pub String);

/// Which UI a window loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// The note list shown in the main window.
    NoteList,
    /// A single note's editor.
    NoteEditor,
}

/// How to construct a window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
    /// Initial outer size.
    pub size: Size,
    /// Initial position. `None` leaves placement to the host.
    pub position: Option<Point>,
    pub min_size: Size,
    pub max_size: Size,
    pub background_color: String,
}

/// Fire-and-forget messages from the core to one window's UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A note's background changed. Sent to the main window's list view.
    NoteColorChanged { color: String, name: String },
    /// A note's title was edited from the list view. Sent to that note.
    NoteTitleChanged { title: String },
}

/// Window operations the session needs from the windowing layer.
///
/// Windows are created hidden and chromeless. Operations on ids the host does
/// not know are ignored by the host.
pub trait WindowHost {
    /// Construct a hidden window and return its fresh handle.
    fn create_window(&mut self, options: &WindowOptions) -> Result<WindowId, HostError>;

    /// Bring a window to the foreground.
    fn focus(&mut self, id: WindowId);

    /// Make a window visible.
    fn show(&mut self, id: WindowId);

    /// Hide a window without destroying it.
    fn hide(&mut self, id: WindowId);

    /// Destroy a window.
    fn close(&mut self, id: WindowId);

    /// Center a window on screen.
    fn center(&mut self, id: WindowId);

    /// Current top-left corner of a window.
    fn position(&self, id: WindowId) -> Option<Point>;

    /// Current outer size of a window.
    fn size(&self, id: WindowId) -> Option<Size>;

    /// The background color the window is actually painting.
    fn background_color(&self, id: WindowId) -> Option<String>;

    /// Repaint a window's background.
    fn set_background_color(&mut self, id: WindowId, color: &str);

    /// Deliver move/resize events for this window to the session from now on.
    fn track_geometry(&mut self, id: WindowId);

    /// Show the window once, when its UI first paints.
    fn reveal_on_first_paint(&mut self, id: WindowId);

    /// Start loading a window's UI. Returns before the UI is ready.
    fn load_view(&mut self, id: WindowId, view: View);

    /// Publish a notification to one window's UI.
    fn notify(&mut self, id: WindowId, notification: Notification);

    /// Ask a yes/no question, owned by `parent` when given.
    fn confirm(
        &mut self,
        parent: Option<WindowId>,
        title: &str,
        message: &str,
    ) -> impl Future<Output = bool> + Send;
}
