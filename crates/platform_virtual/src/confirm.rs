//! Pending yes/no prompts awaiting an answer from a window's UI.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Default)]
struct Pending {
    next_id: u64,
    waiting: HashMap<u64, oneshot::Sender<bool>>,
}

/// Shared table of outstanding confirmation requests.
///
/// The host registers a request and awaits the receiver; whoever reads the
/// UI's reply resolves it by id. Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct ConfirmBroker {
    inner: Arc<Mutex<Pending>>,
}

impl ConfirmBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // The table holds no invariants a panicking holder could break
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a request. The receiver yields the answer.
    pub fn register(&self) -> (u64, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.lock();
        pending.next_id += 1;
        let id = pending.next_id;
        pending.waiting.insert(id, tx);
        (id, rx)
    }

    /// Answer request `id`. Returns `false` if nothing was waiting on it.
    pub fn resolve(&self, id: u64, confirmed: bool) -> bool {
        let Some(tx) = self.lock().waiting.remove(&id) else {
            debug!("Confirm reply for unknown request {}", id);
            return false;
        };
        tx.send(confirmed).is_ok()
    }

    /// Drop request `id` without answering.
    pub fn cancel(&self, id: u64) {
        self.lock().waiting.remove(&id);
    }

    /// Number of requests still waiting.
    pub fn pending(&self) -> usize {
        self.lock().waiting.len()
    }
}
