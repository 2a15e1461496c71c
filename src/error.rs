//! Error types used by the remindvisor runtime.
//!
//! Each failure domain has its own enum:
//!
//! - [`ConfigError`]: startup misconfiguration (never raised after startup).
//! - [`StoreError`] / [`ScanError`]: the event store could not be read.
//! - [`ConnectError`]: the transport session could not be established.
//! - [`SendError`]: one notification could not be delivered.
//! - [`RuntimeError`]: errors raised by the service wrapper itself.
//!
//! All types provide `as_label` (stable snake_case label for logs) in the same way.
//! [`SendError::is_session_fatal`] is the single place that decides whether a send
//! failure is local to one message or means the whole session is gone.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set (or is blank).
    #[error("missing required setting {key}")]
    Missing {
        /// Environment variable name.
        key: &'static str,
    },

    /// A variable is set but its value cannot be used.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Environment variable name.
        key: &'static str,
        /// Why the value was refused.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Missing { .. } => "config_missing",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

/// # Errors produced by an event store implementation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached or the query failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("malformed row {row}: {reason}")]
    Malformed {
        /// Row identifier.
        row: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The addressed user or event does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "store_unavailable",
            StoreError::Malformed { .. } => "store_malformed",
            StoreError::NotFound(_) => "store_not_found",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// # Scan failure reported to the dispatch cycle.
///
/// A failed scan is never turned into an empty result: the caller must be able to tell
/// "nothing outstanding" from "could not look".
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Store momentarily unavailable; the tick is skipped.
    #[error("outstanding-event scan failed: {source}")]
    StoreUnavailable {
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

impl ScanError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScanError::StoreUnavailable { .. } => "scan_store_unavailable",
        }
    }
}

impl From<StoreError> for ScanError {
    fn from(source: StoreError) -> Self {
        ScanError::StoreUnavailable { source }
    }
}

/// # Errors produced while establishing a transport session.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The transport endpoint could not be reached.
    #[error("transport unreachable: {reason}")]
    Unreachable {
        /// Underlying I/O message.
        reason: String,
    },

    /// The transport answered but refused to open a session.
    #[error("session refused: {reason}")]
    Rejected {
        /// Status / message returned by the transport.
        reason: String,
    },

    /// Connection establishment did not finish in time.
    #[error("connect timed out after {timeout:?}")]
    Timeout {
        /// Configured connect timeout.
        timeout: Duration,
    },
}

impl ConnectError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectError::Unreachable { .. } => "connect_unreachable",
            ConnectError::Rejected { .. } => "connect_rejected",
            ConnectError::Timeout { .. } => "connect_timeout",
        }
    }
}

/// # Errors produced by one notification send.
///
/// Adapters classify every failure into one of these variants. Only
/// [`SendError::SessionLost`] is session-fatal; everything else stays local to the
/// recipient and the rest of the batch proceeds.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The transport refused this one message (bad recipient, throttled, ...).
    #[error("message to {address} rejected: {reason}")]
    MessageRejected {
        /// Recipient the message was addressed to.
        address: String,
        /// Transport-provided reason.
        reason: String,
    },

    /// The stored address cannot be turned into a transport recipient.
    #[error("invalid recipient address {address:?}")]
    InvalidAddress {
        /// Raw stored address.
        address: String,
    },

    /// The send did not complete within the per-send bound.
    #[error("send to {address} timed out after {timeout:?}")]
    TimedOut {
        /// Recipient the message was addressed to.
        address: String,
        /// Configured per-send timeout.
        timeout: Duration,
    },

    /// The session itself is no longer usable.
    #[error("session lost: {reason}")]
    SessionLost {
        /// Why the session is considered dead.
        reason: String,
    },
}

impl SendError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SendError::MessageRejected { .. } => "send_rejected",
            SendError::InvalidAddress { .. } => "send_invalid_address",
            SendError::TimedOut { .. } => "send_timeout",
            SendError::SessionLost { .. } => "send_session_lost",
        }
    }

    /// Indicates whether the failure invalidates the whole session.
    ///
    /// # Example
    /// ```
    /// use remindvisor::SendError;
    ///
    /// let local = SendError::MessageRejected { address: "91".into(), reason: "bad".into() };
    /// assert!(!local.is_session_fatal());
    ///
    /// let fatal = SendError::SessionLost { reason: "logged out".into() };
    /// assert!(fatal.is_session_fatal());
    /// ```
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, SendError::SessionLost { .. })
    }
}

/// # Errors produced by the service runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The event store could not be opened at startup.
    #[error("cannot open event store: {0}")]
    Store(#[from] StoreError),

    /// OS signal listeners could not be installed.
    #[error("cannot install signal handlers: {0}")]
    Signal(#[from] std::io::Error),

    /// Shutdown grace period was exceeded while a tick was still in flight.
    #[error("shutdown timeout {grace:?} exceeded; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use remindvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5) };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Store(_) => "runtime_store",
            RuntimeError::Signal(_) => "runtime_signal",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}
