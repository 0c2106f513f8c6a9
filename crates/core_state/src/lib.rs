//! Stickies Core State
//!
//! Platform-agnostic state core for the stickies desktop notes app.
//!
//! This crate keeps the in-memory registry of live note windows consistent with
//! the persisted configuration document:
//! - The document lists one [`WindowRecord`] per logical window (the main list
//!   window plus one per note) and is loaded once, mutated by every handler and
//!   written back at the save points.
//! - The [`WindowRegistry`] maps note names to live window handles and is
//!   rebuilt each process start.
//! - A [`Session`] owns both and drives real windows through the
//!   [`WindowHost`] seam, so the handlers run unchanged against a native
//!   toolkit, the virtual host, or a test double.

mod document;
mod host;
mod main_window;
mod notes;
mod registry;
mod session;
mod store;

#[cfg(test)]
mod testing;

use serde::{Deserialize, Serialize};

pub use document::{Document, Placement, WindowRecord};
pub use host::{HostError, Notification, View, WindowHost, WindowOptions};
pub use main_window::{CloseOutcome, NoteSummary};
pub use notes::{NoteSnapshot, OpenOutcome};
pub use registry::{RegistryError, WindowRegistry};
pub use session::{Session, SessionError};
pub use store::{ConfigStore, StoreError};

/// Runtime identifier of a live window.
/// Assigned fresh by the host on every creation and meaningless across restarts.
pub type WindowId = u64;

/// Reserved record name of the primary (note list) window.
pub const MAIN_WINDOW_NAME: &str = "mainWindow";

/// Background of a newly created note.
pub const DEFAULT_NOTE_BACKGROUND: &str = "#b8fc90";

/// Background of the main window.
pub const DEFAULT_MAIN_BACKGROUND: &str = "#222222";

/// Title given to a newly created note.
pub const DEFAULT_NOTE_TITLE: &str = "My new note";

/// A screen position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An outer window size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Create a new size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp both dimensions into `[min, max]`.
    pub fn clamp(self, min: Size, max: Size) -> Size {
        Size {
            width: self.width.clamp(min.width, max.width.max(min.width)),
            height: self.height.clamp(min.height, max.height.max(min.height)),
        }
    }
}

/// A rectangle in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Top-left corner.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Width and height.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// A rectangle of `size` centered inside this one.
    pub fn center(&self, size: Size) -> Rect {
        let dx = (self.width as i64 - size.width as i64) / 2;
        let dy = (self.height as i64 - size.height as i64) / 2;
        Rect::new(self.x + dx as i32, self.y + dy as i32, size.width, size.height)
    }
}

/// Size limits and colors applied to newly created windows and records.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDefaults {
    /// Minimum (and initial) window size.
    pub min_size: Size,
    /// Maximum window size.
    pub max_size: Size,
    /// Background color for new notes.
    pub note_background: String,
    /// Background color for the main window.
    pub main_background: String,
    /// Title for new notes.
    pub note_title: String,
}

impl Default for WindowDefaults {
    fn default() -> Self {
        Self {
            min_size: Size::new(300, 320),
            max_size: Size::new(1000, 1000),
            note_background: DEFAULT_NOTE_BACKGROUND.to_string(),
            main_background: DEFAULT_MAIN_BACKGROUND.to_string(),
            note_title: DEFAULT_NOTE_TITLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_clamp() {
        let min = Size::new(300, 320);
        let max = Size::new(1000, 1000);
        assert_eq!(Size::new(10, 2000).clamp(min, max), Size::new(300, 1000));
        assert_eq!(Size::new(500, 500).clamp(min, max), Size::new(500, 500));
    }

    #[test]
    fn test_size_clamp_inverted_bounds() {
        // max below min collapses onto min instead of panicking
        let min = Size::new(300, 320);
        let max = Size::new(100, 100);
        assert_eq!(Size::new(50, 50).clamp(min, max), min);
    }

    #[test]
    fn test_rect_center() {
        let screen = Rect::new(0, 0, 1920, 1080);
        let placed = screen.center(Size::new(300, 320));
        assert_eq!(placed, Rect::new(810, 380, 300, 320));
    }

    #[test]
    fn test_rect_center_offset_screen() {
        let screen = Rect::new(1920, 0, 1000, 1000);
        let placed = screen.center(Size::new(1200, 400));
        assert_eq!(placed.position(), Point::new(1820, 300));
    }

    #[test]
    fn test_window_defaults() {
        let defaults = WindowDefaults::default();
        assert_eq!(defaults.min_size, Size::new(300, 320));
        assert_eq!(defaults.note_background, "#b8fc90");
        assert_eq!(defaults.main_background, "#222222");
        assert_eq!(defaults.note_title, "My new note");
    }
}
