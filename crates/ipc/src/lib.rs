//! Stickies IPC Protocol
//!
//! Shared types for traffic between window UIs (or the CLI) and the daemon.
//!
//! Every message is one line of JSON. A connection sends one [`IpcCommand`] and
//! reads one [`IpcResponse`]. After a successful `subscribe` the connection stays
//! open and the daemon streams [`UiEvent`] lines for that window.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Default loopback address of the daemon.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:47615";

/// Upper bound for one line. Note content travels inline, so this is generous.
pub const MAX_IPC_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Runtime identifier of a live window.
pub type WindowId = u64;

/// Errors from framing or parsing protocol lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message of {0} bytes exceeds the {MAX_IPC_MESSAGE_SIZE} byte limit")]
    TooLarge(usize),

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// A rectangle in screen coordinates, as reported by a window's UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl IpcRect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Requests a window's UI layer sends to the daemon.
///
/// Requests scoped to a calling window carry its id explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Open a note window, or focus it if already open.
    OpenNote {
        /// Note name. A fresh `note<N>` is used when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Delete a note after confirmation on the main window.
    DeleteNote { name: String },
    /// Name, title and color of every note.
    ListNotes,
    /// Color, title and content for the calling note window.
    GetNoteData { window: WindowId },
    /// Store the calling note's editor content.
    SaveNoteContent { window: WindowId, content: String },
    /// Change the calling note's background.
    SetNoteBackground { window: WindowId, color: String },
    /// The calling window's close button.
    CloseWindow { window: WindowId },
    /// Persist everything and exit.
    Quit,
    /// Rename a note from the list view.
    SetNoteTitle { name: String, title: String },

    /// The window was moved or resized to `rect`.
    ReportGeometry { window: WindowId, rect: IpcRect },
    /// The window's UI painted for the first time.
    ReadyToShow { window: WindowId },

    /// Attach this connection as the UI channel of the live window `name`.
    Subscribe { name: String },
    /// Answer to a [`UiEvent::ConfirmRequest`].
    ConfirmReply { request_id: u64, confirmed: bool },

    /// Daemon status.
    QueryStatus,
}

impl IpcCommand {
    /// Whether the sender does not wait on anything beyond an acknowledgement.
    ///
    /// Window UIs may send these one-way on their subscription connection.
    pub fn is_fire_and_forget(&self) -> bool {
        matches!(
            self,
            IpcCommand::SaveNoteContent { .. }
                | IpcCommand::SetNoteBackground { .. }
                | IpcCommand::CloseWindow { .. }
                | IpcCommand::Quit
                | IpcCommand::SetNoteTitle { .. }
                | IpcCommand::ReportGeometry { .. }
                | IpcCommand::ReadyToShow { .. }
        )
    }
}

/// One entry in the main window's note list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteListItem {
    pub name: String,
    pub title: String,
    pub color: String,
}

/// Responses from the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Request handled.
    Ok,
    /// Request failed.
    Error {
        /// What went wrong.
        message: String,
    },
    /// A note window was created.
    Opened { name: String },
    /// The note was already open; its window was focused.
    AlreadyOpen,
    /// Outcome of a delete request.
    DeleteResult { confirmed: bool },
    /// Every note except the main window.
    NoteList { notes: Vec<NoteListItem> },
    /// Data for a note editor.
    NoteData {
        color: String,
        title: String,
        content: String,
    },
    /// The connection is now the UI channel of `window`.
    Subscribed { window: WindowId },
    /// Daemon status.
    Status {
        version: String,
        /// Records in the document, main window included.
        records: usize,
        /// Note windows currently live.
        live_notes: usize,
        /// Live windows, main window included.
        windows: usize,
        /// Delete prompts still waiting for an answer.
        pending_confirms: usize,
        uptime_seconds: u64,
    },
}

impl IpcResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Which UI a window shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpcView {
    NoteList,
    NoteEditor,
}

/// Messages pushed from the daemon to one window's UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    /// Load this view. Sent once on subscribe.
    LoadView { view: IpcView },
    /// A note's background changed (main window only).
    NoteColorChanged { color: String, name: String },
    /// This note's title was edited from the list.
    NoteTitleChanged { title: String },
    /// Ask the user a yes/no question and answer with `confirm_reply`.
    ConfirmRequest {
        request_id: u64,
        title: String,
        message: String,
    },
    /// The window became visible.
    Shown,
    /// The window was hidden.
    Hidden,
    /// The window was raised to the foreground.
    Focused,
    /// The window was destroyed. No further events follow.
    Closed,
}

/// Serialize `message` as one newline-terminated line.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    if line.len() > MAX_IPC_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(line.len()));
    }
    line.push('\n');
    Ok(line)
}

/// Parse one line, ignoring surrounding whitespace.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    if line.len() > MAX_IPC_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(line.len()));
    }
    Ok(serde_json::from_str(line.trim())?)
}
