//! # SQLite-backed event store.
//!
//! rusqlite is blocking, so every call runs on `spawn_blocking` against a connection
//! guarded by a `std::sync::Mutex`.
//!
//! Malformed rows (unparseable due time, unknown state or priority) are skipped with a
//! warning so one bad row never hides the reminders of every other user.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::EventStore;
use super::migrations::apply_migrations;
use crate::error::StoreError;
use crate::model::{
    Event, NewEvent, OutstandingEvent, Priority, Recipient, ResolutionState,
};

/// rusqlite-backed [`EventStore`].
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let started_at = Instant::now();
        let conn = Connection::open(path.as_ref())?;
        let store = Self::bootstrap(conn)?;
        tracing::info!(
            path = %path.as_ref().display(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "event store opened"
        );
        Ok(store)
    }

    /// Opens an in-memory database and applies migrations.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection mutex poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store worker failed: {e}")))?
    }

    /// Registers a user and returns its id.
    pub async fn add_user(&self, address: impl Into<String>) -> Result<i64, StoreError> {
        let address = address.into();
        self.with_conn(move |conn| {
            conn.execute("INSERT INTO users (address) VALUES (?1)", params![address])?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Creates an outstanding event for `user_id` and returns the new event id.
    ///
    /// Event ids are allocated per user.
    pub async fn add_event(&self, user_id: i64, event: NewEvent) -> Result<i64, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let exists: Option<i64> = tx
                .query_row("SELECT id FROM users WHERE id = ?1", params![user_id], |r| {
                    r.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::NotFound(format!("user {user_id}")));
            }
            let next_id: i64 = tx.query_row(
                "SELECT COALESCE(MAX(id), 0) + 1 FROM events WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )?;
            tx.execute(
                "INSERT INTO events (user_id, id, name, due_at, description, state, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user_id,
                    next_id,
                    event.name,
                    event.due.to_rfc3339_opts(SecondsFormat::Secs, true),
                    event.description,
                    ResolutionState::Outstanding.as_str(),
                    event.priority.map(|p| p.as_str()),
                ],
            )?;
            tx.commit()?;
            Ok(next_id)
        })
        .await
    }

    /// Marks an event resolved. Resolving twice is a no-op.
    pub async fn resolve_event(&self, user_id: i64, event_id: i64) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE events SET state = ?3 WHERE user_id = ?1 AND id = ?2",
                params![user_id, event_id, ResolutionState::Resolved.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!(
                    "event {event_id} of user {user_id}"
                )));
            }
            Ok(())
        })
        .await
    }

    /// Deletes an event.
    pub async fn delete_event(&self, user_id: i64, event_id: i64) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "DELETE FROM events WHERE user_id = ?1 AND id = ?2",
                params![user_id, event_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!(
                    "event {event_id} of user {user_id}"
                )));
            }
            Ok(())
        })
        .await
    }
}

struct RawRow {
    user_id: i64,
    address: String,
    id: i64,
    name: String,
    due_at: String,
    description: Option<String>,
    state: String,
    priority: Option<String>,
}

impl RawRow {
    fn decode(self) -> Result<Option<OutstandingEvent>, StoreError> {
        let malformed = |reason: String| StoreError::Malformed {
            row: format!("{}/{}", self.user_id, self.id),
            reason,
        };

        let state: ResolutionState = self.state.parse().map_err(malformed)?;
        if state != ResolutionState::Outstanding {
            return Ok(None);
        }
        let due = DateTime::parse_from_rfc3339(&self.due_at)
            .map_err(|e| malformed(format!("due_at {:?}: {e}", self.due_at)))?
            .with_timezone(&Utc);
        let priority = self
            .priority
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(str::parse::<Priority>)
            .transpose()
            .map_err(malformed)?;

        Ok(Some(OutstandingEvent {
            recipient: Recipient {
                user_id: self.user_id,
                address: self.address,
            },
            event: Event {
                id: self.id,
                name: self.name,
                due,
                description: self.description,
                state,
                priority,
            },
        }))
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn find_outstanding(&self) -> Result<Vec<OutstandingEvent>, StoreError> {
        let rows = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT u.id, u.address, e.id, e.name, e.due_at, e.description, e.state, e.priority
                     FROM events e JOIN users u ON u.id = e.user_id
                     WHERE e.state <> 'resolved'
                     ORDER BY u.id, e.id",
                )?;
                let rows = stmt
                    .query_map([], |r| {
                        Ok(RawRow {
                            user_id: r.get(0)?,
                            address: r.get(1)?,
                            id: r.get(2)?,
                            name: r.get(3)?,
                            due_at: r.get(4)?,
                            description: r.get(5)?,
                            state: r.get(6)?,
                            priority: r.get(7)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match row.decode() {
                Ok(Some(ev)) => out.push(ev),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, label = err.as_label(), "skipping malformed event row");
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 2, 9, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_resolved_events_are_not_outstanding() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.add_user("9876543210").await.unwrap();
        let first = store.add_event(user, NewEvent::new("Pay rent", due())).await.unwrap();
        let second = store.add_event(user, NewEvent::new("Call mom", due())).await.unwrap();
        assert_eq!((first, second), (1, 2));

        store.resolve_event(user, first).await.unwrap();

        let found = store.find_outstanding().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].event.name, "Call mom");
        assert_eq!(found[0].recipient.address, "9876543210");
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.add_user("9876543210").await.unwrap();
        store.add_event(user, NewEvent::new("Good", due())).await.unwrap();
        store
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO events (user_id, id, name, due_at, state) VALUES (?1, 99, 'Bad', 'tomorrow-ish', 'outstanding')",
                    params![user],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let found = store.find_outstanding().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].event.name, "Good");
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.add_event(42, NewEvent::new("x", due())).await.unwrap_err();
        assert_eq!(err.as_label(), "store_not_found");
    }
}
