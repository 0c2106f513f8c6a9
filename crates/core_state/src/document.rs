//! The persisted document: one [`WindowRecord`] per logical window.

use serde::{Deserialize, Serialize};

use crate::{
    Point, Size, WindowDefaults, WindowId, DEFAULT_MAIN_BACKGROUND, DEFAULT_NOTE_BACKGROUND,
    MAIN_WINDOW_NAME,
};

/// Where a window sits on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Never positioned. The next creation centers the window once.
    #[default]
    Unplaced,
    /// Last known top-left corner.
    PlacedAt(Point),
}

impl Placement {
    /// The stored position, if any.
    pub fn position(&self) -> Option<Point> {
        match self {
            Placement::Unplaced => None,
            Placement::PlacedAt(point) => Some(*point),
        }
    }

    /// Whether the window has been positioned before.
    pub fn is_placed(&self) -> bool {
        matches!(self, Placement::PlacedAt(_))
    }
}

/// Persisted state for one window (main or note).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordRepr", into = "RecordRepr")]
pub struct WindowRecord {
    /// Identity, unique within the document.
    pub name: String,
    /// Display title. Notes only.
    pub title: Option<String>,
    /// Last known outer size.
    pub size: Option<Size>,
    /// Last known position.
    pub placement: Placement,
    /// Hex background color.
    pub background_color: String,
    /// Opaque rich-text payload owned by the editor. Notes only.
    pub content: Option<String>,
    /// Whether the window is restored open at next launch.
    pub is_open: bool,
    /// Live handle id, present only while the window is open.
    pub window_handle_id: Option<WindowId>,
}

impl WindowRecord {
    /// A fresh note record with default title, size and background.
    pub fn new_note(name: impl Into<String>, defaults: &WindowDefaults) -> Self {
        Self {
            name: name.into(),
            title: Some(defaults.note_title.clone()),
            size: Some(defaults.min_size),
            placement: Placement::Unplaced,
            background_color: defaults.note_background.clone(),
            content: Some(String::new()),
            is_open: false,
            window_handle_id: None,
        }
    }

    /// A fresh main window record. Open by default so a first launch shows the list.
    pub fn new_main(defaults: &WindowDefaults) -> Self {
        Self {
            name: MAIN_WINDOW_NAME.to_string(),
            title: None,
            size: Some(defaults.min_size),
            placement: Placement::Unplaced,
            background_color: defaults.main_background.clone(),
            content: None,
            is_open: true,
            window_handle_id: None,
        }
    }

    /// Whether this is the main window's record.
    pub fn is_main(&self) -> bool {
        self.name == MAIN_WINDOW_NAME
    }
}

/// Flat on-disk shape of a record.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRepr {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x_pos: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y_pos: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default)]
    is_open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    window_handle_id: Option<WindowId>,
}

impl From<RecordRepr> for WindowRecord {
    fn from(repr: RecordRepr) -> Self {
        let size = match (repr.width, repr.height) {
            (Some(width), Some(height)) => Some(Size::new(width, height)),
            _ => None,
        };
        let placement = match (repr.x_pos, repr.y_pos) {
            (Some(x), Some(y)) => Placement::PlacedAt(Point::new(x, y)),
            _ => Placement::Unplaced,
        };
        let background_color = repr.background_color.unwrap_or_else(|| {
            if repr.name == MAIN_WINDOW_NAME {
                DEFAULT_MAIN_BACKGROUND.to_string()
            } else {
                DEFAULT_NOTE_BACKGROUND.to_string()
            }
        });

        Self {
            name: repr.name,
            title: repr.title,
            size,
            placement,
            background_color,
            content: repr.content,
            is_open: repr.is_open,
            window_handle_id: repr.window_handle_id,
        }
    }
}

impl From<WindowRecord> for RecordRepr {
    fn from(record: WindowRecord) -> Self {
        let position = record.placement.position();
        Self {
            name: record.name,
            title: record.title,
            width: record.size.map(|s| s.width),
            height: record.size.map(|s| s.height),
            x_pos: position.map(|p| p.x),
            y_pos: position.map(|p| p.y),
            background_color: Some(record.background_color),
            content: record.content,
            is_open: record.is_open,
            window_handle_id: record.window_handle_id,
        }
    }
}

/// The whole persisted configuration.
///
/// Record order is creation order and carries no other meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub windows: Vec<WindowRecord>,
}

impl Document {
    /// Index of the record named `name`.
    pub fn find_index_by_name(&self, name: &str) -> Option<usize> {
        self.windows.iter().position(|w| w.name == name)
    }

    /// Index of the record whose live handle is `id`.
    pub fn find_index_by_handle(&self, id: WindowId) -> Option<usize> {
        self.windows
            .iter()
            .position(|w| w.window_handle_id == Some(id))
    }

    /// Name for a note opened without one.
    ///
    /// Starts at `note<count>` and increments past names already taken.
    pub fn next_default_name(&self) -> String {
        let mut n = self.windows.len();
        loop {
            let candidate = format!("note{}", n);
            if self.find_index_by_name(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// All note records (everything but the main window), in document order.
    pub fn notes(&self) -> impl Iterator<Item = &WindowRecord> {
        self.windows.iter().filter(|w| !w.is_main())
    }
}
