//! # ConnectionSupervisor: keeps one transport session alive.
//!
//! Owns the lifecycle of the transport session and the [`DispatchTimer`] bound to it.
//!
//! ## Event flow
//! ```text
//! ConnectAttempt → connect() ── Ok ──► Connected → [ticking] → SessionLost
//!                            └─ Err ─► ConnectFailed
//!   → BackoffScheduled → [sleep] → (next attempt)
//! ```
//!
//! ## Architecture
//! ```text
//! loop {
//!   ├─► state = Connecting, publish ConnectAttempt
//!   ├─► timeout(connect_timeout, transport.connect())
//!   │     ├─► Ok(session):
//!   │     │     state = Connected, failures = 0
//!   │     │     timer.start(session)
//!   │     │     select { session.closed() , shutdown.cancelled() }
//!   │     │     timer.stop().await            (in-flight tick finishes)
//!   │     │     publish SessionLost
//!   │     └─► Err(e): publish ConnectFailed, failures += 1
//!   ├─► state = Restarting
//!   ├─► delay = backoff.next(failures), publish BackoffScheduled
//!   └─► sleep(delay) (cancellable)
//! }
//! ```
//!
//! ## Rules
//! - At most one live session at a time; a new one is only opened after the old one
//!   has been torn down and the backoff elapsed
//! - A lost session restarts exactly once, however many sends observed the loss
//! - Retries are unbounded; the attempt counter is a lifetime counter
//! - Shutdown is honored from every state and leaves the supervisor `Disconnected`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::dispatch::DispatchTimer;
use crate::error::ConnectError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::transport::{Session, SessionConfig, Transport};

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SupervisorState {
    /// Not started, or stopped by shutdown.
    #[default]
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// A live session exists and the timer is ticking.
    Connected,
    /// Waiting out the backoff before the next attempt.
    Restarting,
}

/// Parameters for the supervisor loop.
#[derive(Clone, Debug)]
pub struct SupervisorParams {
    /// Session to open on every attempt.
    pub session: SessionConfig,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
    /// Upper bound for one `connect`.
    pub connect_timeout: Duration,
}

/// Keeps a transport session alive and drives the dispatch timer.
pub struct ConnectionSupervisor {
    transport: Arc<dyn Transport>,
    timer: DispatchTimer,
    params: SupervisorParams,
    bus: Bus,
    state: watch::Sender<SupervisorState>,
}

/// Why a connected phase ended.
enum Phase {
    Lost,
    Shutdown,
}

impl ConnectionSupervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        timer: DispatchTimer,
        params: SupervisorParams,
        bus: Bus,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Disconnected);
        Self {
            transport,
            timer,
            params,
            bus,
            state,
        }
    }

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Receiver observing every state change.
    pub fn watch_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: SupervisorState) {
        self.state.send_replace(next);
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut attempt: u32 = 0;
        let mut failures: u32 = 0;

        while !shutdown.is_cancelled() {
            attempt = attempt.saturating_add(1);
            self.set_state(SupervisorState::Connecting);
            self.bus
                .publish(Event::new(EventKind::ConnectAttempt).with_attempt(attempt));
            tracing::debug!(transport = self.transport.name(), attempt, "opening session");

            let connected = select! {
                res = self.connect() => res,
                _ = shutdown.cancelled() => break,
            };

            match connected {
                Ok(session) => {
                    failures = 0;
                    if let Phase::Shutdown = self.serve(session, attempt, &shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    self.bus.publish(
                        Event::new(EventKind::ConnectFailed)
                            .with_attempt(attempt)
                            .with_reason(e.to_string()),
                    );
                }
            }

            self.set_state(SupervisorState::Restarting);
            let delay = self.params.backoff.next(failures.saturating_sub(1));
            self.bus.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_attempt(attempt)
                    .with_delay(delay),
            );

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = shutdown.cancelled() => break,
            }
        }

        self.timer.stop().await;
        self.set_state(SupervisorState::Disconnected);
        self.bus.publish(Event::new(EventKind::SupervisorStopped));
    }

    async fn connect(&self) -> Result<Session, ConnectError> {
        let connect = self.transport.connect(&self.params.session);
        let limit = self.params.connect_timeout;
        match time::timeout(limit, connect).await {
            Ok(res) => res,
            Err(_elapsed) => Err(ConnectError::Timeout { timeout: limit }),
        }
    }

    /// Runs the connected phase of one session until it is lost or shutdown arrives.
    async fn serve(&self, session: Session, attempt: u32, shutdown: &CancellationToken) -> Phase {
        self.set_state(SupervisorState::Connected);
        self.bus.publish(
            Event::new(EventKind::Connected)
                .with_session(session.id())
                .with_attempt(attempt),
        );
        tracing::info!(
            transport = self.transport.name(),
            session = session.id(),
            every = ?self.timer.period(),
            "session connected, dispatching reminders"
        );
        self.timer.start(session.clone()).await;

        let phase = select! {
            _ = session.closed() => Phase::Lost,
            _ = shutdown.cancelled() => Phase::Shutdown,
        };

        self.timer.stop().await;
        match phase {
            Phase::Lost => {
                self.bus.publish(
                    Event::new(EventKind::SessionLost)
                        .with_session(session.id())
                        .with_reason(session.termination_reason().unwrap_or("session closed")),
                );
            }
            Phase::Shutdown => self.transport.disconnect(&session).await,
        }
        phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchCycle, DispatchSettings};
    use crate::scanner::Scanner;
    use crate::store::MemoryStore;
    use crate::transport::FakeTransport;

    fn supervisor(transport: Arc<FakeTransport>) -> Arc<ConnectionSupervisor> {
        let bus = Bus::new(256);
        let cycle = Arc::new(DispatchCycle::new(
            Scanner::new(Arc::new(MemoryStore::new())),
            transport.clone(),
            bus.clone(),
            DispatchSettings::default(),
        ));
        Arc::new(ConnectionSupervisor::new(
            transport,
            DispatchTimer::new(cycle, Duration::from_secs(60)),
            SupervisorParams {
                session: SessionConfig::default(),
                backoff: BackoffPolicy::default(),
                connect_timeout: Duration::from_secs(60),
            },
            bus,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_session_loss() {
        let transport = Arc::new(FakeTransport::new());
        let sup = supervisor(transport.clone());
        let token = CancellationToken::new();
        let handle = {
            let sup = sup.clone();
            let token = token.clone();
            tokio::spawn(async move { sup.run(token).await })
        };

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sup.state(), SupervisorState::Connected);
        assert_eq!(transport.sessions().len(), 1);

        assert!(transport.drop_session("phone went offline"));
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sup.state(), SupervisorState::Restarting);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sup.state(), SupervisorState::Connected);
        assert_eq!(transport.sessions().len(), 2);

        token.cancel();
        handle.await.unwrap();
        assert_eq!(sup.state(), SupervisorState::Disconnected);
        assert!(transport.sessions().iter().all(|s| !s.is_alive()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_waits_for_backoff() {
        let transport = Arc::new(FakeTransport::new());
        transport.script_connects([Err(ConnectError::Unreachable {
            reason: "gateway down".into(),
        })]);
        let sup = supervisor(transport.clone());
        let mut states = sup.watch_state();
        let token = CancellationToken::new();
        let handle = {
            let sup = sup.clone();
            let token = token.clone();
            tokio::spawn(async move { sup.run(token).await })
        };

        states
            .wait_for(|s| *s == SupervisorState::Restarting)
            .await
            .unwrap();
        states
            .wait_for(|s| *s == SupervisorState::Connected)
            .await
            .unwrap();

        let calls = transport.connect_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1] - calls[0] >= Duration::from_secs(5));

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff() {
        let transport = Arc::new(FakeTransport::new());
        transport.script_connects([Err(ConnectError::Rejected {
            reason: "HTTP 500".into(),
        })]);
        let sup = supervisor(transport.clone());
        let token = CancellationToken::new();
        let handle = {
            let sup = sup.clone();
            let token = token.clone();
            tokio::spawn(async move { sup.run(token).await })
        };

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sup.state(), SupervisorState::Restarting);
        token.cancel();
        handle.await.unwrap();

        assert_eq!(sup.state(), SupervisorState::Disconnected);
        assert_eq!(transport.connect_calls().len(), 1);
    }
}
