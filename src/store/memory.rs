//! # In-memory event store.
//!
//! Holds users and their events behind a `std::sync::RwLock`. Intended for tests and
//! embedding; [`MemoryStore::set_unavailable`] simulates a store outage and
//! [`MemoryStore::query_count`] exposes how often the scanner hit it.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::EventStore;
use crate::error::StoreError;
use crate::model::{Event, NewEvent, OutstandingEvent, ResolutionState, User};

/// In-memory [`EventStore`].
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    unavailable: AtomicBool,
    queries: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user and returns its id.
    pub fn add_user(&self, address: impl Into<String>) -> i64 {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        users.push(User {
            id,
            address: address.into(),
            events: Vec::new(),
        });
        id
    }

    /// Creates an outstanding event and returns its per-user id.
    pub fn add_event(&self, user_id: i64, event: NewEvent) -> Result<i64, StoreError> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
        let id = user.events.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        user.events.push(event.into_event(id));
        Ok(id)
    }

    /// Marks an event resolved.
    pub fn resolve_event(&self, user_id: i64, event_id: i64) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        let event: &mut Event = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .and_then(|u| u.events.iter_mut().find(|e| e.id == event_id))
            .ok_or_else(|| StoreError::NotFound(format!("event {event_id} of user {user_id}")))?;
        event.state = ResolutionState::Resolved;
        Ok(())
    }

    /// Toggles simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `find_outstanding` calls so far (failed ones included).
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_outstanding(&self) -> Result<Vec<OutstandingEvent>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store marked unavailable".into()));
        }
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))?;
        Ok(users.iter().flat_map(|u| u.outstanding()).collect())
    }
}
