//! # Outstanding-event scanner.
//!
//! [`Scanner::scan`] returns every outstanding event of every user, **including events
//! that are not yet due**: each tick reminds about all pending items, not only the due
//! ones. A failed query is surfaced as [`ScanError`], never as an empty result.

use std::sync::Arc;
use std::time::Instant;

use crate::error::ScanError;
use crate::model::OutstandingEvent;
use crate::store::EventStore;

/// Read-only view over the event store used by the dispatch cycle.
#[derive(Clone)]
pub struct Scanner {
    store: Arc<dyn EventStore>,
}

impl Scanner {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Queries all outstanding events across all users.
    pub async fn scan(&self) -> Result<Vec<OutstandingEvent>, ScanError> {
        let started_at = Instant::now();
        let found = self.store.find_outstanding().await?;
        tracing::debug!(
            outstanding = found.len(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "scan finished"
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewEvent;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_scan_includes_future_and_overdue_events() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("9876543210");
        store
            .add_event(user, NewEvent::new("overdue", Utc::now() - Duration::days(3)))
            .unwrap();
        store
            .add_event(user, NewEvent::new("next year", Utc::now() + Duration::days(365)))
            .unwrap();

        let found = Scanner::new(store).scan().await.unwrap();
        let names: Vec<_> = found.iter().map(|o| o.event.name.as_str()).collect();
        assert_eq!(names, ["overdue", "next year"]);
    }

    #[tokio::test]
    async fn test_scan_failure_is_not_an_empty_result() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);

        let err = Scanner::new(store).scan().await.unwrap_err();
        assert_eq!(err.as_label(), "scan_store_unavailable");
    }
}
