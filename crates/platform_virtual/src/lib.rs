//! Stickies Platform Virtual
//!
//! A headless [`WindowHost`]: windows are plain records, and whatever draws
//! them attaches over IPC as a UI client.
//!
//! This crate handles:
//! - Window bookkeeping (geometry, visibility, background, view)
//! - Fan-out of host events to attached UI clients
//! - Geometry and first-paint reports coming back from those clients
//! - Confirmation prompts routed to the parent window's UI

pub mod confirm;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use stickies_core::{
    HostError, Notification, Point, Rect, Size, View, WindowHost, WindowId, WindowOptions,
};
use stickies_ipc::{IpcView, UiEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

pub use confirm::ConfirmBroker;

/// Errors from virtual window operations.
#[derive(Debug, Error)]
pub enum VirtualError {
    #[error("Window not found: {0}")]
    WindowNotFound(WindowId),

    #[error("Window limit of {0} reached")]
    WindowLimit(usize),
}

impl From<VirtualError> for HostError {
    fn from(e: VirtualError) -> Self {
        HostError(e.to_string())
    }
}

/// Channel a UI client receives its events on.
pub type UiSink = mpsc::UnboundedSender<UiEvent>;

/// Configuration for the virtual platform layer.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Screen area windows are centered in.
    pub screen: Rect,
    /// How long a confirmation prompt waits for an answer.
    pub confirm_timeout: Duration,
    /// Answer given when no UI is attached to the prompt's parent window.
    pub confirm_without_ui: bool,
    /// Maximum number of live windows.
    pub max_windows: usize,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            screen: Rect::new(0, 0, 1920, 1080),
            confirm_timeout: Duration::from_secs(60),
            confirm_without_ui: false,
            max_windows: 256,
        }
    }
}

/// State of one virtual window.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualWindow {
    pub rect: Rect,
    pub min_size: Size,
    pub max_size: Size,
    pub visible: bool,
    pub background: String,
    pub view: Option<View>,
    /// Geometry reports are forwarded to the session.
    pub tracked: bool,
    /// Show on the first ready-to-show report.
    pub reveal_on_ready: bool,
}

/// Map a core view to its wire form.
pub fn ipc_view(view: View) -> IpcView {
    match view {
        View::NoteList => IpcView::NoteList,
        View::NoteEditor => IpcView::NoteEditor,
    }
}

/// Map a core notification to the event a UI client receives.
pub fn ui_event(notification: Notification) -> UiEvent {
    match notification {
        Notification::NoteColorChanged { color, name } => UiEvent::NoteColorChanged { color, name },
        Notification::NoteTitleChanged { title } => UiEvent::NoteTitleChanged { title },
    }
}

/// Headless window host.
#[derive(Debug)]
pub struct VirtualHost {
    config: PlatformConfig,
    windows: HashMap<WindowId, VirtualWindow>,
    next_id: WindowId,
    subscribers: HashMap<WindowId, Vec<UiSink>>,
    confirms: ConfirmBroker,
}

impl VirtualHost {
    /// Create a host with no windows.
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
            next_id: 1,
            subscribers: HashMap::new(),
            confirms: ConfirmBroker::new(),
        }
    }

    /// Broker the IPC layer resolves confirmation replies through.
    pub fn confirm_broker(&self) -> ConfirmBroker {
        self.confirms.clone()
    }

    /// A live window.
    pub fn window(&self, id: WindowId) -> Option<&VirtualWindow> {
        self.windows.get(&id)
    }

    /// Number of live windows.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Number of UI clients attached to `id`.
    pub fn ui_count(&self, id: WindowId) -> usize {
        self.subscribers.get(&id).map_or(0, Vec::len)
    }

    /// Attach a UI client to a window, alongside any already attached.
    ///
    /// The new client immediately receives the window's view and, if the
    /// window is already on screen, a `shown` event. Existing clients see
    /// nothing.
    pub fn attach_ui(&mut self, id: WindowId, sink: UiSink) -> Result<Option<IpcView>, VirtualError> {
        let window = self
            .windows
            .get(&id)
            .ok_or(VirtualError::WindowNotFound(id))?;
        let view = window.view.map(ipc_view);

        let mut replay = Vec::new();
        if let Some(view) = view {
            replay.push(UiEvent::LoadView { view });
        }
        if window.visible {
            replay.push(UiEvent::Shown);
        }
        if replay.into_iter().any(|event| sink.send(event).is_err()) {
            debug!("UI client of window {} left while attaching", id);
            return Ok(view);
        }

        self.subscribers.entry(id).or_default().push(sink);
        Ok(view)
    }

    /// Apply a move/resize reported by a window's UI.
    ///
    /// The size is clamped to the window's limits. Returns whether the window
    /// is tracked, so the caller knows to persist the new geometry.
    pub fn report_geometry(&mut self, id: WindowId, rect: Rect) -> Result<bool, VirtualError> {
        let window = self
            .windows
            .get_mut(&id)
            .ok_or(VirtualError::WindowNotFound(id))?;
        let size = rect.size().clamp(window.min_size, window.max_size);
        window.rect = Rect::new(rect.x, rect.y, size.width, size.height);
        trace!(
            "Window {} now at ({}, {}) {}x{}",
            id,
            rect.x,
            rect.y,
            size.width,
            size.height
        );
        Ok(window.tracked)
    }

    /// A window's UI finished its first paint.
    ///
    /// Reveals the window once if it was created to be revealed. Returns
    /// whether it was shown by this call.
    pub fn ready_to_show(&mut self, id: WindowId) -> Result<bool, VirtualError> {
        let window = self
            .windows
            .get_mut(&id)
            .ok_or(VirtualError::WindowNotFound(id))?;
        if !window.reveal_on_ready {
            return Ok(false);
        }
        window.reveal_on_ready = false;
        if !window.visible {
            window.visible = true;
            self.send(id, UiEvent::Shown);
        }
        Ok(true)
    }

    /// Deliver `event` to every client of `id`, dropping the dead ones.
    fn send(&mut self, id: WindowId, event: UiEvent) {
        let Some(sinks) = self.subscribers.get_mut(&id) else {
            trace!("No UI attached to window {}, dropping {:?}", id, event);
            return;
        };
        sinks.retain(|sink| {
            let alive = sink.send(event.clone()).is_ok();
            if !alive {
                debug!("UI client of window {} went away", id);
            }
            alive
        });
        if sinks.is_empty() {
            self.subscribers.remove(&id);
        }
    }
}

impl WindowHost for VirtualHost {
    fn create_window(&mut self, options: &WindowOptions) -> Result<WindowId, HostError> {
        if self.windows.len() >= self.config.max_windows {
            return Err(VirtualError::WindowLimit(self.config.max_windows).into());
        }

        let id = self.next_id;
        self.next_id += 1;

        let size = options.size.clamp(options.min_size, options.max_size);
        let position = options
            .position
            .unwrap_or_else(|| self.config.screen.position());
        self.windows.insert(
            id,
            VirtualWindow {
                rect: Rect::new(position.x, position.y, size.width, size.height),
                min_size: options.min_size,
                max_size: options.max_size,
                visible: false,
                background: options.background_color.clone(),
                view: None,
                tracked: false,
                reveal_on_ready: false,
            },
        );
        debug!("Created virtual window {}", id);
        Ok(id)
    }

    fn focus(&mut self, id: WindowId) {
        if self.windows.contains_key(&id) {
            self.send(id, UiEvent::Focused);
        }
    }

    fn show(&mut self, id: WindowId) {
        if let Some(window) = self.windows.get_mut(&id) {
            if !window.visible {
                window.visible = true;
                self.send(id, UiEvent::Shown);
            }
        }
    }

    fn hide(&mut self, id: WindowId) {
        if let Some(window) = self.windows.get_mut(&id) {
            if window.visible {
                window.visible = false;
                self.send(id, UiEvent::Hidden);
            }
        }
    }

    fn close(&mut self, id: WindowId) {
        if self.windows.remove(&id).is_none() {
            return;
        }
        self.send(id, UiEvent::Closed);
        self.subscribers.remove(&id);
        debug!("Closed virtual window {}", id);
    }

    fn center(&mut self, id: WindowId) {
        let screen = self.config.screen;
        if let Some(window) = self.windows.get_mut(&id) {
            window.rect = screen.center(window.rect.size());
        }
    }

    fn position(&self, id: WindowId) -> Option<Point> {
        self.windows.get(&id).map(|w| w.rect.position())
    }

    fn size(&self, id: WindowId) -> Option<Size> {
        self.windows.get(&id).map(|w| w.rect.size())
    }

    fn background_color(&self, id: WindowId) -> Option<String> {
        self.windows.get(&id).map(|w| w.background.clone())
    }

    fn set_background_color(&mut self, id: WindowId, color: &str) {
        if let Some(window) = self.windows.get_mut(&id) {
            window.background = color.to_string();
        }
    }

    fn track_geometry(&mut self, id: WindowId) {
        if let Some(window) = self.windows.get_mut(&id) {
            window.tracked = true;
        }
    }

    fn reveal_on_first_paint(&mut self, id: WindowId) {
        if let Some(window) = self.windows.get_mut(&id) {
            window.reveal_on_ready = true;
        }
    }

    fn load_view(&mut self, id: WindowId, view: View) {
        if let Some(window) = self.windows.get_mut(&id) {
            window.view = Some(view);
            self.send(id, UiEvent::LoadView { view: ipc_view(view) });
        }
    }

    fn notify(&mut self, id: WindowId, notification: Notification) {
        if self.windows.contains_key(&id) {
            self.send(id, ui_event(notification));
        }
    }

    fn confirm(
        &mut self,
        parent: Option<WindowId>,
        title: &str,
        message: &str,
    ) -> impl Future<Output = bool> + Send {
        let sinks = parent
            .and_then(|id| self.subscribers.get(&id).cloned())
            .unwrap_or_default();
        let broker = self.confirms.clone();
        let timeout = self.config.confirm_timeout;
        let fallback = self.config.confirm_without_ui;
        let title = title.to_string();
        let message = message.to_string();

        async move {
            if sinks.is_empty() {
                debug!("No UI to confirm '{}', answering {}", title, fallback);
                return fallback;
            }

            // Every client gets the prompt; the broker keeps the first answer
            let (request_id, answer) = broker.register();
            let request = UiEvent::ConfirmRequest {
                request_id,
                title,
                message,
            };
            let delivered = sinks
                .iter()
                .filter(|sink| sink.send(request.clone()).is_ok())
                .count();
            if delivered == 0 {
                broker.cancel(request_id);
                debug!("UI went away before confirm request {}", request_id);
                return fallback;
            }

            match tokio::time::timeout(timeout, answer).await {
                Ok(Ok(confirmed)) => confirmed,
                Ok(Err(_)) => false,
                Err(_) => {
                    broker.cancel(request_id);
                    warn!(
                        "Confirm request {} unanswered after {:?}, treating as declined",
                        request_id, timeout
                    );
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> WindowOptions {
        WindowOptions {
            size: Size::new(300, 320),
            position: None,
            min_size: Size::new(300, 320),
            max_size: Size::new(1000, 1000),
            background_color: "#b8fc90".to_string(),
        }
    }

    fn host() -> VirtualHost {
        VirtualHost::new(PlatformConfig::default())
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_platform_config_default() {
        let config = PlatformConfig::default();
        assert_eq!(config.screen, Rect::new(0, 0, 1920, 1080));
        assert_eq!(config.confirm_timeout, Duration::from_secs(60));
        assert!(!config.confirm_without_ui);
    }

    #[test]
    fn test_create_window_hidden_with_fresh_ids() {
        let mut host = host();
        let a = host.create_window(&options()).unwrap();
        let b = host.create_window(&options()).unwrap();
        assert_ne!(a, b);

        let window = host.window(a).unwrap();
        assert!(!window.visible);
        assert_eq!(window.rect, Rect::new(0, 0, 300, 320));
        assert_eq!(window.background, "#b8fc90");
    }

    #[test]
    fn test_create_window_clamps_size() {
        let mut host = host();
        let mut opts = options();
        opts.size = Size::new(5000, 10);
        opts.position = Some(Point::new(40, 50));
        let id = host.create_window(&opts).unwrap();
        assert_eq!(host.window(id).unwrap().rect, Rect::new(40, 50, 1000, 320));
    }

    #[test]
    fn test_window_limit() {
        let mut host = VirtualHost::new(PlatformConfig {
            max_windows: 1,
            ..Default::default()
        });
        host.create_window(&options()).unwrap();
        let err = host.create_window(&options()).unwrap_err();
        assert!(err.0.contains("limit"));
    }

    #[test]
    fn test_center() {
        let mut host = host();
        let id = host.create_window(&options()).unwrap();
        host.center(id);
        assert_eq!(host.position(id), Some(Point::new(810, 380)));
    }

    #[test]
    fn test_report_geometry_clamps_and_reports_tracking() {
        let mut host = host();
        let id = host.create_window(&options()).unwrap();

        assert!(!host.report_geometry(id, Rect::new(1, 2, 400, 400)).unwrap());
        host.track_geometry(id);
        assert!(host.report_geometry(id, Rect::new(-5, 7, 10, 2000)).unwrap());
        assert_eq!(host.window(id).unwrap().rect, Rect::new(-5, 7, 300, 1000));

        assert!(matches!(
            host.report_geometry(999, Rect::new(0, 0, 1, 1)),
            Err(VirtualError::WindowNotFound(999))
        ));
    }

    #[test]
    fn test_ready_to_show_reveals_once() {
        let mut host = host();
        let id = host.create_window(&options()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        host.attach_ui(id, tx).unwrap();

        // Not armed yet
        assert!(!host.ready_to_show(id).unwrap());
        assert!(!host.window(id).unwrap().visible);

        host.reveal_on_first_paint(id);
        assert!(host.ready_to_show(id).unwrap());
        assert!(host.window(id).unwrap().visible);
        assert!(!host.ready_to_show(id).unwrap());

        assert_eq!(drain(&mut rx), vec![UiEvent::Shown]);
    }

    #[test]
    fn test_attach_ui_replays_view_and_visibility() {
        let mut host = host();
        let id = host.create_window(&options()).unwrap();
        host.load_view(id, View::NoteEditor);
        host.show(id);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let view = host.attach_ui(id, tx).unwrap();
        assert_eq!(view, Some(IpcView::NoteEditor));
        assert_eq!(
            drain(&mut rx),
            vec![
                UiEvent::LoadView {
                    view: IpcView::NoteEditor
                },
                UiEvent::Shown
            ]
        );
    }

    #[test]
    fn test_attach_ui_unknown_window() {
        let mut host = host();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            host.attach_ui(7, tx),
            Err(VirtualError::WindowNotFound(7))
        ));
    }

    #[test]
    fn test_show_hide_close_events() {
        let mut host = host();
        let id = host.create_window(&options()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        host.attach_ui(id, tx).unwrap();

        host.show(id);
        host.show(id);
        host.hide(id);
        host.focus(id);
        host.close(id);

        assert_eq!(
            drain(&mut rx),
            vec![
                UiEvent::Shown,
                UiEvent::Hidden,
                UiEvent::Focused,
                UiEvent::Closed
            ]
        );
        assert!(host.window(id).is_none());
        assert_eq!(host.ui_count(id), 0);

        // Operations on a closed window are ignored
        host.show(id);
        assert_eq!(host.position(id), None);
        assert_eq!(host.background_color(id), None);
    }

    #[test]
    fn test_notify_maps_to_ui_event() {
        let mut host = host();
        let id = host.create_window(&options()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        host.attach_ui(id, tx).unwrap();

        host.notify(
            id,
            Notification::NoteColorChanged {
                color: "#ff0000".to_string(),
                name: "note1".to_string(),
            },
        );
        assert_eq!(
            drain(&mut rx),
            vec![UiEvent::NoteColorChanged {
                color: "#ff0000".to_string(),
                name: "note1".to_string(),
            }]
        );
    }

    #[test]
    fn test_dead_subscriber_is_dropped() {
        let mut host = host();
        let id = host.create_window(&options()).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        host.attach_ui(id, tx).unwrap();
        drop(rx);

        host.show(id);
        assert_eq!(host.ui_count(id), 0);
    }

    #[test]
    fn test_second_ui_client_keeps_first() {
        let mut host = host();
        let id = host.create_window(&options()).unwrap();
        host.load_view(id, View::NoteList);
        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        host.attach_ui(id, first_tx).unwrap();
        drain(&mut first_rx);

        // A short-lived second client attaches and leaves
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();
        host.attach_ui(id, second_tx).unwrap();
        assert_eq!(host.ui_count(id), 2);
        assert_eq!(
            drain(&mut second_rx),
            vec![UiEvent::LoadView {
                view: IpcView::NoteList
            }]
        );
        drop(second_rx);

        let color_changed = Notification::NoteColorChanged {
            color: "#123456".to_string(),
            name: "note1".to_string(),
        };
        host.notify(id, color_changed.clone());

        // The first client saw no replay and still gets notifications
        assert_eq!(drain(&mut first_rx), vec![ui_event(color_changed)]);
        assert_eq!(host.ui_count(id), 1);
    }

    #[tokio::test]
    async fn test_confirm_without_ui_uses_fallback() {
        let mut host = host();
        let id = host.create_window(&options()).unwrap();
        assert!(!host.confirm(Some(id), "t", "m").await);

        let mut host = VirtualHost::new(PlatformConfig {
            confirm_without_ui: true,
            ..Default::default()
        });
        assert!(host.confirm(None, "t", "m").await);
    }

    #[tokio::test]
    async fn test_confirm_round_trip_through_ui() {
        let mut host = host();
        let main = host.create_window(&options()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        host.attach_ui(main, tx).unwrap();
        let broker = host.confirm_broker();

        let prompt = host.confirm(Some(main), "Confirm Delete", "Sure?");
        let ui = async move {
            match rx.recv().await {
                Some(UiEvent::ConfirmRequest {
                    request_id,
                    title,
                    message,
                }) => {
                    assert_eq!(title, "Confirm Delete");
                    assert_eq!(message, "Sure?");
                    assert!(broker.resolve(request_id, true));
                }
                other => panic!("Expected confirm request, got {:?}", other),
            }
        };

        let (answer, ()) = tokio::join!(prompt, ui);
        assert!(answer);
        assert_eq!(host.confirm_broker().pending(), 0);
    }

    #[tokio::test]
    async fn test_confirm_first_answer_wins_across_clients() {
        let mut host = host();
        let main = host.create_window(&options()).unwrap();
        let (idle_tx, mut idle_rx) = mpsc::unbounded_channel();
        host.attach_ui(main, idle_tx).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        host.attach_ui(main, tx).unwrap();
        let broker = host.confirm_broker();

        let prompt = host.confirm(Some(main), "Confirm Delete", "Sure?");
        let ui = async move {
            let Some(UiEvent::ConfirmRequest { request_id, .. }) = rx.recv().await else {
                panic!("Expected confirm request");
            };
            assert!(broker.resolve(request_id, true));
            // The idle client saw the same prompt, its late answer is refused
            let Some(UiEvent::ConfirmRequest { request_id: seen, .. }) = idle_rx.recv().await
            else {
                panic!("Expected confirm request on the idle client");
            };
            assert_eq!(seen, request_id);
            assert!(!broker.resolve(seen, false));
        };

        let (answer, ()) = tokio::join!(prompt, ui);
        assert!(answer);
    }

    #[tokio::test]
    async fn test_confirm_timeout_declines() {
        let mut host = VirtualHost::new(PlatformConfig {
            confirm_timeout: Duration::from_millis(20),
            ..Default::default()
        });
        let main = host.create_window(&options()).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        host.attach_ui(main, tx).unwrap();

        assert!(!host.confirm(Some(main), "t", "m").await);
        assert_eq!(host.confirm_broker().pending(), 0);
    }
}
