//! # Scripted in-process transport.
//!
//! [`FakeTransport`] is the test double for [`Transport`]: connection attempts and
//! per-recipient send outcomes are scripted, and everything the runtime does is recorded.
//!
//! ```text
//! connect ─► pop scripted outcome (default Ok) ─► new Session, recorded in sessions()
//! send    ─► dead session? SessionLost
//!          ─► scripted FakeSend for recipient (default Ok) ─► recorded in sent()/attempts()
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{Session, SessionConfig, Transport};
use crate::error::{ConnectError, SendError};

/// Scripted outcome of a send to one recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeSend {
    /// Accept the message.
    Ok,
    /// Reject this one message.
    Reject(String),
    /// Report the session as lost (the fake also terminates it, like a real client).
    LoseSession(String),
    /// Never answer.
    Hang,
    /// Accept after a delay.
    Delay(Duration),
}

/// One recorded send attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub session: u64,
    pub recipient: String,
    pub text: String,
}

#[derive(Default)]
struct State {
    connect_script: VecDeque<Result<(), ConnectError>>,
    send_script: HashMap<String, FakeSend>,
    connect_calls: Vec<Instant>,
    sessions: Vec<Session>,
    attempts: Vec<SentMessage>,
    delivered: Vec<SentMessage>,
}

/// Scripted [`Transport`] double.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<State>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues outcomes for the next connection attempts (later attempts succeed).
    pub fn script_connects(&self, outcomes: impl IntoIterator<Item = Result<(), ConnectError>>) {
        self.state().connect_script.extend(outcomes);
    }

    /// Scripts every send to `recipient`.
    pub fn script_send(&self, recipient: impl Into<String>, outcome: FakeSend) {
        self.state().send_script.insert(recipient.into(), outcome);
    }

    /// Removes every scripted send outcome.
    pub fn clear_send_script(&self) {
        self.state().send_script.clear();
    }

    /// Instants (tokio clock) of every connection attempt.
    pub fn connect_calls(&self) -> Vec<Instant> {
        self.state().connect_calls.clone()
    }

    /// Sessions handed out so far, oldest first.
    pub fn sessions(&self) -> Vec<Session> {
        self.state().sessions.clone()
    }

    /// Most recent session, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.state().sessions.last().cloned()
    }

    /// Simulates the transport dropping the current session.
    pub fn drop_session(&self, reason: &str) -> bool {
        self.current_session()
            .map(|s| s.terminate(reason))
            .unwrap_or(false)
    }

    /// Every send call that reached the transport.
    pub fn attempts(&self) -> Vec<SentMessage> {
        self.state().attempts.clone()
    }

    /// Sends that were accepted.
    pub fn delivered(&self) -> Vec<SentMessage> {
        self.state().delivered.clone()
    }

    /// Highest number of concurrently executing sends observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn connect(&self, cfg: &SessionConfig) -> Result<Session, ConnectError> {
        let mut state = self.state();
        state.connect_calls.push(Instant::now());
        if let Some(Err(e)) = state.connect_script.pop_front() {
            return Err(e);
        }
        let session = Session::open(cfg.name.clone());
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn send(&self, session: &Session, recipient: &str, text: &str) -> Result<(), SendError> {
        let record = SentMessage {
            session: session.id(),
            recipient: recipient.to_string(),
            text: text.to_string(),
        };
        let outcome = {
            let mut state = self.state();
            state.attempts.push(record.clone());
            state
                .send_script
                .get(recipient)
                .cloned()
                .unwrap_or(FakeSend::Ok)
        };

        if !session.is_alive() {
            return Err(SendError::SessionLost {
                reason: "send on terminated session".into(),
            });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        // one scheduler round trip, so concurrent sends overlap like real requests
        tokio::task::yield_now().await;

        match outcome {
            FakeSend::Ok => {}
            FakeSend::Delay(d) => tokio::time::sleep(d).await,
            FakeSend::Hang => std::future::pending::<()>().await,
            FakeSend::Reject(reason) => {
                return Err(SendError::MessageRejected {
                    address: recipient.to_string(),
                    reason,
                });
            }
            FakeSend::LoseSession(reason) => {
                session.terminate(reason.clone());
                return Err(SendError::SessionLost { reason });
            }
        }
        self.state().delivered.push(record);
        Ok(())
    }
}
