//! # Runtime event hook.
//!
//! [`Subscribe`] is how callers observe the dispatcher: tick reports, session churn,
//! backoff waits and shutdown progress all arrive here as [`Event`]s.
//!
//! A subscriber is driven by its own worker over its own bounded queue, so a sink that
//! stalls (a slow log shipper, a metrics push) falls behind alone. When its queue is
//! full, further events for that subscriber are dropped and the drop is logged. The
//! supervisor and the dispatch cycle never wait on a subscriber.

use async_trait::async_trait;

use crate::events::Event;

/// Receives runtime events, in publish order, one at a time.
///
/// Implementations should not block the executor and should keep their own failures
/// to themselves; a panic is caught and logged, and the worker keeps going.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Label used in log lines about this subscriber.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue depth for this subscriber; zero is treated as one.
    fn queue_capacity(&self) -> usize {
        256
    }
}
