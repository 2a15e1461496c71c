//! # Subscriber fan-out.
//!
//! [`SubscriberSet`] hands every runtime [`Event`] to each registered subscriber
//! through a per-subscriber lane: a bounded queue plus one worker task.
//!
//! ```text
//!   emit(&Event) ── Arc<Event> ──┬──► lane "log"     ─► worker ─► on_event()
//!                                └──► lane "metrics" ─► worker ─► on_event()
//! ```
//!
//! `emit` never waits. Each lane preserves publish order, but lanes are not ordered
//! relative to each other. A full or closed lane loses the event and counts the loss.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::Event;

use super::Subscribe;

struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
    dropped: AtomicU64,
    worker: JoinHandle<()>,
}

impl Lane {
    fn spawn(sub: Arc<dyn Subscribe>) -> Self {
        let name = sub.name();
        let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let handled = AssertUnwindSafe(sub.on_event(&event)).catch_unwind().await;
                if let Err(panic) = handled {
                    tracing::error!(
                        subscriber = name,
                        kind = ?event.kind,
                        seq = event.seq,
                        ?panic,
                        "subscriber panicked while handling event"
                    );
                }
            }
        });

        Self {
            name,
            tx,
            dropped: AtomicU64::new(0),
            worker,
        }
    }

    fn offer(&self, event: &Arc<Event>) {
        let reason = match self.tx.try_send(Arc::clone(event)) {
            Ok(()) => return,
            Err(TrySendError::Full(_)) => "queue full",
            Err(TrySendError::Closed(_)) => "worker gone",
        };
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(
            subscriber = self.name,
            kind = ?event.kind,
            dropped_total = total,
            "event dropped for subscriber: {reason}"
        );
    }
}

/// Runtime events fanned out to a fixed list of subscribers.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Requires a running tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        Self {
            lanes: subs.into_iter().map(Lane::spawn).collect(),
        }
    }

    pub fn emit(&self, event: &Event) {
        if self.lanes.is_empty() {
            return;
        }
        let shared = Arc::new(event.clone());
        for lane in &self.lanes {
            lane.offer(&shared);
        }
    }

    /// Events lost by the named subscriber so far, or `None` if no such subscriber.
    #[must_use]
    pub fn dropped(&self, name: &str) -> Option<u64> {
        self.lanes
            .iter()
            .find(|lane| lane.name == name)
            .map(|lane| lane.dropped.load(Ordering::Relaxed))
    }

    /// Closes every lane, then waits until each worker has drained what it already holds.
    pub async fn shutdown(self) {
        let mut workers = Vec::with_capacity(self.lanes.len());
        for lane in self.lanes {
            workers.push(lane.worker);
        }
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::debug!(error = %e, "subscriber worker ended abnormally");
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploding;

    #[async_trait]
    impl Subscribe for Exploding {
        async fn on_event(&self, _event: &Event) {
            panic!("sink exploded");
        }
    }

    /// Blocks on a gate that is only ever closed, never given permits.
    struct Stalled(Arc<Semaphore>);

    #[async_trait]
    impl Subscribe for Stalled {
        async fn on_event(&self, _event: &Event) {
            let _ = self.0.acquire().await;
        }

        fn name(&self) -> &'static str {
            "stalled"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_panicking_subscriber_leaves_others_in_order() {
        let recorder = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Exploding), recorder.clone()];
        let set = SubscriberSet::new(subs);
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::TickStarted));
        set.emit(&Event::new(EventKind::NotificationSent));
        set.emit(&Event::new(EventKind::TickCompleted));
        set.shutdown().await;

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                EventKind::TickStarted,
                EventKind::NotificationSent,
                EventKind::TickCompleted
            ]
        );
    }

    #[tokio::test]
    async fn test_stalled_subscriber_drops_only_its_own_events() {
        let gate = Arc::new(Semaphore::new(0));
        let recorder = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Stalled(gate.clone())), recorder.clone()];
        let set = SubscriberSet::new(subs);

        for _ in 0..5 {
            set.emit(&Event::new(EventKind::TickSkipped));
            tokio::task::yield_now().await;
        }

        assert!(set.dropped("stalled").unwrap() >= 3);
        assert_eq!(set.dropped("recorder"), Some(0));
        assert_eq!(set.dropped("missing"), None);

        gate.close();
        set.shutdown().await;
        assert_eq!(recorder.0.lock().unwrap().len(), 5);
    }
}
