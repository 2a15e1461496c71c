//! # Event store interface and implementations.
//!
//! The dispatch core only needs one query from the user/event store:
//! [`EventStore::find_outstanding`]. Everything else (event CRUD, profiles) belongs to
//! the request-handling collaborators.
//!
//! - [`SqliteStore`]: rusqlite-backed store used by the service binary
//! - [`MemoryStore`]: in-process store for tests and embedding, with fault injection
//!
//! ## Connection strings
//! ```text
//! sqlite://relative/or/absolute/path.db
//! sqlite::memory:
//! /plain/path/to/events.db
//! ```

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::OutstandingEvent;

mod memory;
mod migrations;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Query interface consumed by the outstanding-event scanner.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Returns every outstanding event of every user, regardless of due time.
    ///
    /// Fails with [`StoreError::Unavailable`] on connectivity loss; never returns an
    /// empty list in place of a failure.
    async fn find_outstanding(&self) -> Result<Vec<OutstandingEvent>, StoreError>;
}

/// Opens the store addressed by a connection string.
pub fn open(url: &str) -> Result<SqliteStore, StoreError> {
    let url = url.trim();
    if url == "sqlite::memory:" || url == ":memory:" {
        return SqliteStore::open_in_memory();
    }
    let path = url.strip_prefix("sqlite://").unwrap_or(url);
    if path.is_empty() {
        return Err(StoreError::Unavailable(format!(
            "unsupported store connection string {url:?}"
        )));
    }
    SqliteStore::open(path)
}
