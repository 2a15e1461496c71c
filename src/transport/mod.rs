//! # Transport client adapter.
//!
//! The messaging transport is an external managed client. The runtime only sees the
//! capability trait [`Transport`] with two operations:
//!
//! ```text
//! connect(&SessionConfig) ──► Session          | ConnectError
//! send(&Session, recipient, text) ──► ()       | SendError
//! ```
//!
//! Implementations:
//! - [`HttpGateway`]: talks to a messaging gateway over HTTP (reqwest)
//! - [`FakeTransport`]: scripted in-process double for tests
//!
//! ## Failure classification
//! Adapters decide, per failure, whether it is local to one message or fatal to the
//! session, and encode the answer as a [`SendError`] variant. The dispatch cycle never
//! inspects error text; it only asks [`SendError::is_session_fatal`].

use async_trait::async_trait;

use crate::error::{ConnectError, SendError};

mod fake;
mod gateway;
mod session;

pub use fake::{FakeSend, FakeTransport, SentMessage};
pub use gateway::HttpGateway;
pub use session::Session;

/// Parameters for opening a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Transport-side session name.
    pub name: String,
}

impl SessionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("reminder-session")
    }
}

/// Capability interface over the messaging transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// Opens a new session.
    ///
    /// The returned [`Session`] must be terminated by the adapter when the underlying
    /// connection is lost.
    async fn connect(&self, cfg: &SessionConfig) -> Result<Session, ConnectError>;

    /// Sends one text message through `session`.
    ///
    /// Must fail with [`SendError::SessionLost`] (and not panic) when `session` has
    /// already been terminated.
    async fn send(&self, session: &Session, recipient: &str, text: &str) -> Result<(), SendError>;

    /// Closes a session on shutdown. The default only terminates the local handle.
    async fn disconnect(&self, session: &Session) {
        session.terminate("disconnected by supervisor");
    }
}
