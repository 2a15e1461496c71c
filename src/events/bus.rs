//! # Runtime event bus.
//!
//! The supervisor and the dispatch cycle report what they are doing by publishing
//! [`Event`]s here. The service forwards them to its subscribers; tests and embedders
//! can attach their own receiver with [`Bus::subscribe`].
//!
//! ```text
//!   ConnectionSupervisor ─┐                 ┌─► service listener ─► SubscriberSet
//!                         ├─► Bus (bounded) ┤
//!   DispatchCycle ────────┘                 └─► Bus::subscribe() receivers
//! ```
//!
//! Publishing never waits. A receiver that falls more than `capacity` events behind
//! sees `RecvError::Lagged` and resumes from the oldest retained event. Events published
//! while nobody is listening are gone.

use tokio::sync::broadcast;

use super::event::Event;

const DEFAULT_CAPACITY: usize = 1024;

/// Cloneable handle to the runtime event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: Event) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            tracing::trace!(kind = ?event.kind, "no bus receivers, event discarded");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Receivers currently attached.
    pub fn receivers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_each_receiver_sees_every_event() {
        let bus = Bus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.receivers(), 2);

        bus.publish(Event::new(EventKind::ConnectAttempt).with_attempt(1));
        bus.publish(Event::new(EventKind::Connected).with_session(7));

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await.unwrap().kind, EventKind::ConnectAttempt);
            assert_eq!(rx.recv().await.unwrap().session, Some(7));
        }
    }

    #[tokio::test]
    async fn test_lagging_receiver_is_told_how_far_behind() {
        let bus = Bus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(Event::new(EventKind::TickSkipped));
        }
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(n)) => assert_eq!(n, 3),
            other => panic!("expected lag, got {other:?}"),
        }
    }

    #[test]
    fn test_publish_without_receivers_is_harmless() {
        let bus = Bus::default();
        bus.publish(Event::new(EventKind::ShutdownRequested));
        assert_eq!(bus.receivers(), 0);
    }
}
