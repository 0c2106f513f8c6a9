//! Scripted in-memory window host for session tests.

use std::collections::BTreeMap;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

use tempfile::TempDir;

use crate::{
    ConfigStore, Document, HostError, Notification, Point, Rect, Session, Size, View,
    WindowDefaults, WindowHost, WindowId, WindowOptions,
};

#[derive(Debug, Clone)]
pub(crate) struct FakeWindow {
    pub position: Point,
    pub size: Size,
    pub background: String,
    pub visible: bool,
    pub closed: bool,
    pub tracked: bool,
    pub reveal_on_paint: bool,
    pub view: Option<View>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug)]
pub(crate) struct FakeHost {
    windows: BTreeMap<WindowId, FakeWindow>,
    next_id: WindowId,
    pub screen: Rect,
    pub center_calls: usize,
    pub focus_calls: Vec<WindowId>,
    pub confirm_answer: bool,
    pub confirm_calls: Vec<Option<WindowId>>,
    pub fail_create: bool,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            windows: BTreeMap::new(),
            next_id: 1,
            screen: Rect::new(0, 0, 1920, 1080),
            center_calls: 0,
            focus_calls: Vec::new(),
            confirm_answer: true,
            confirm_calls: Vec::new(),
            fail_create: false,
        }
    }

    pub fn window(&self, id: WindowId) -> Option<&FakeWindow> {
        self.windows.get(&id)
    }

    /// Windows created and not closed.
    pub fn live_count(&self) -> usize {
        self.windows.values().filter(|w| !w.closed).count()
    }

    /// Simulate the user dragging or resizing a window.
    pub fn move_window(&mut self, id: WindowId, rect: Rect) {
        if let Some(window) = self.live_mut(id) {
            window.position = rect.position();
            window.size = rect.size();
        }
    }

    /// Simulate something outside the session repainting a window.
    pub fn paint_background(&mut self, id: WindowId, color: &str) {
        if let Some(window) = self.live_mut(id) {
            window.background = color.to_string();
        }
    }

    fn live_mut(&mut self, id: WindowId) -> Option<&mut FakeWindow> {
        self.windows.get_mut(&id).filter(|w| !w.closed)
    }
}

impl WindowHost for FakeHost {
    fn create_window(&mut self, options: &WindowOptions) -> Result<WindowId, HostError> {
        if self.fail_create {
            return Err(HostError("scripted failure".to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.windows.insert(
            id,
            FakeWindow {
                position: options.position.unwrap_or(Point::new(0, 0)),
                size: options.size,
                background: options.background_color.clone(),
                visible: false,
                closed: false,
                tracked: false,
                reveal_on_paint: false,
                view: None,
                notifications: Vec::new(),
            },
        );
        Ok(id)
    }

    fn focus(&mut self, id: WindowId) {
        self.focus_calls.push(id);
    }

    fn show(&mut self, id: WindowId) {
        if let Some(window) = self.live_mut(id) {
            window.visible = true;
        }
    }

    fn hide(&mut self, id: WindowId) {
        if let Some(window) = self.live_mut(id) {
            window.visible = false;
        }
    }

    fn close(&mut self, id: WindowId) {
        if let Some(window) = self.live_mut(id) {
            window.visible = false;
            window.closed = true;
        }
    }

    fn center(&mut self, id: WindowId) {
        self.center_calls += 1;
        let screen = self.screen;
        if let Some(window) = self.live_mut(id) {
            window.position = screen.center(window.size).position();
        }
    }

    fn position(&self, id: WindowId) -> Option<Point> {
        self.windows.get(&id).filter(|w| !w.closed).map(|w| w.position)
    }

    fn size(&self, id: WindowId) -> Option<Size> {
        self.windows.get(&id).filter(|w| !w.closed).map(|w| w.size)
    }

    fn background_color(&self, id: WindowId) -> Option<String> {
        self.windows
            .get(&id)
            .filter(|w| !w.closed)
            .map(|w| w.background.clone())
    }

    fn set_background_color(&mut self, id: WindowId, color: &str) {
        self.paint_background(id, color);
    }

    fn track_geometry(&mut self, id: WindowId) {
        if let Some(window) = self.live_mut(id) {
            window.tracked = true;
        }
    }

    fn reveal_on_first_paint(&mut self, id: WindowId) {
        if let Some(window) = self.live_mut(id) {
            window.reveal_on_paint = true;
        }
    }

    fn load_view(&mut self, id: WindowId, view: View) {
        if let Some(window) = self.live_mut(id) {
            window.view = Some(view);
        }
    }

    fn notify(&mut self, id: WindowId, notification: Notification) {
        if let Some(window) = self.live_mut(id) {
            window.notifications.push(notification);
        }
    }

    fn confirm(
        &mut self,
        parent: Option<WindowId>,
        _title: &str,
        _message: &str,
    ) -> impl Future<Output = bool> + Send {
        self.confirm_calls.push(parent);
        std::future::ready(self.confirm_answer)
    }
}

/// A session over a [`FakeHost`] whose store lives in a temp directory.
pub(crate) struct Harness {
    session: Session<FakeHost>,
    _dir: TempDir,
}

impl Harness {
    pub fn path(&self) -> PathBuf {
        self.session.store().path().to_path_buf()
    }

    pub fn fake(&mut self) -> &mut FakeHost {
        self.session.host_mut()
    }
}

impl Deref for Harness {
    type Target = Session<FakeHost>;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for Harness {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

pub(crate) fn session_with(document: Document) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ConfigStore::with_document(dir.path().join("noteconfig.json"), document);
    Harness {
        session: Session::new(store, FakeHost::new(), WindowDefaults::default()),
        _dir: dir,
    }
}
