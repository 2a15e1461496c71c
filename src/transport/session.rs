//! # Transport session handle.
//!
//! A [`Session`] is one lifetime of the transport connection. It is shared read-only by
//! every send of a tick (`Clone` is an `Arc` clone) and is never revived: on reconnect
//! the supervisor gets a brand new `Session`.
//!
//! ## Termination latch
//! ```text
//! alive ──terminate(reason)──► terminated   (first reason wins, later calls are no-ops)
//!                                  │
//!                                  └─► closed().await resolves for every waiter
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

struct Inner {
    id: u64,
    name: String,
    opened_at: DateTime<Utc>,
    reason: OnceLock<String>,
    token: CancellationToken,
}

/// One lifetime of a transport connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Creates a fresh, alive session with a process-unique id.
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: SESSION_SEQ.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                opened_at: Utc::now(),
                reason: OnceLock::new(),
                token: CancellationToken::new(),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Transport-side session name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[inline]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.inner.opened_at
    }

    /// True until the session has been terminated.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.inner.token.is_cancelled()
    }

    /// Tears the session down.
    ///
    /// Returns `true` only for the call that actually terminated it.
    pub fn terminate(&self, reason: impl Into<String>) -> bool {
        if self.inner.reason.set(reason.into()).is_ok() {
            self.inner.token.cancel();
            true
        } else {
            false
        }
    }

    /// Why the session was terminated, if it was.
    pub fn termination_reason(&self) -> Option<&str> {
        self.inner.reason.get().map(String::as_str)
    }

    /// Resolves once the session is terminated.
    pub async fn closed(&self) {
        self.inner.token.cancelled().await
    }

    /// Token cancelled on termination; for adapter-side background tasks.
    pub(crate) fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("alive", &self.is_alive())
            .field("reason", &self.termination_reason())
            .finish()
    }
}
