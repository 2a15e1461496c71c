//! # LiveNotifier: fire-and-forget prompts to connected clients.
//!
//! ```text
//! subscribe(address) ──► LiveSubscription (bounded mpsc receiver)
//!
//! emit(address, &LiveEvent)
//!   └─► LivePrompt::new
//!        └─► for each sender registered under address:
//!              try_send ── Ok      → reached += 1
//!                       ├─ Full    → prompt dropped for that client
//!                       └─ Closed  → sender pruned
//! ```
//!
//! No persistence, no retry, no delivery guarantee. Nothing here is shared with the
//! dispatch cycle.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

use super::{LiveEvent, LivePrompt};

/// Receiving end of one live client. Dropping it unsubscribes.
#[derive(Debug)]
pub struct LiveSubscription {
    address: String,
    rx: mpsc::Receiver<LivePrompt>,
}

impl LiveSubscription {
    /// Address this subscription listens on.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Next prompt; `None` once the notifier is gone.
    pub async fn recv(&mut self) -> Option<LivePrompt> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<LivePrompt> {
        self.rx.try_recv().ok()
    }
}

/// Registry of live clients keyed by address.
pub struct LiveNotifier {
    capacity: usize,
    clients: Mutex<HashMap<String, Vec<mpsc::Sender<LivePrompt>>>>,
}

impl Default for LiveNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl LiveNotifier {
    /// Creates a notifier whose per-client queues hold `capacity` prompts (min 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn clients(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<mpsc::Sender<LivePrompt>>>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a live client for `address`.
    pub fn subscribe(&self, address: impl Into<String>) -> LiveSubscription {
        let address = address.into();
        let (tx, rx) = mpsc::channel(self.capacity);
        self.clients().entry(address.clone()).or_default().push(tx);
        LiveSubscription { address, rx }
    }

    /// Pushes a prompt for `event` to every client of `address`.
    ///
    /// Returns how many clients accepted the prompt. The count is informational.
    pub fn emit(&self, address: &str, event: &LiveEvent) -> usize {
        let prompt = LivePrompt::new(address, event);
        let mut clients = self.clients();
        let Some(senders) = clients.get_mut(address) else {
            return 0;
        };

        let mut reached = 0;
        senders.retain(|tx| match tx.try_send(prompt.clone()) {
            Ok(()) => {
                reached += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(address, "live client queue full, prompt dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if senders.is_empty() {
            clients.remove(address);
        }
        reached
    }

    /// Number of live clients registered under `address`.
    pub fn subscribers(&self, address: &str) -> usize {
        self.clients()
            .get(address)
            .map(|s| s.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}
