//! # DispatchTimer: fixed-interval tick driver for one session.
//!
//! ```text
//! start(session):
//!   stop() previous run
//!   spawn loop {
//!     select { token.cancelled() → break, interval.tick() → {} }
//!     cycle.run_tick(&session).await      (next tick awaited only after this one)
//!   }
//!
//! stop():
//!   token.cancel() ─► await loop handle   (in-flight tick finishes, no new tick)
//! ```
//!
//! The first tick fires one full interval after `start`. Ticks that fall behind are
//! delayed, never bunched ([`MissedTickBehavior::Delay`]).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::DispatchCycle;
use crate::transport::Session;

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the periodic tick loop of the current session.
pub struct DispatchTimer {
    cycle: Arc<DispatchCycle>,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl DispatchTimer {
    /// Creates a stopped timer. A zero `period` is raised to 1ms.
    pub fn new(cycle: Arc<DispatchCycle>, period: Duration) -> Self {
        Self {
            cycle,
            period: period.max(Duration::from_millis(1)),
            running: Mutex::new(None),
        }
    }

    /// Tick interval.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Starts ticking for `session`, stopping any previous run first.
    pub async fn start(&self, session: Session) {
        self.stop().await;

        let token = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            Arc::clone(&self.cycle),
            session,
            self.period,
            token.clone(),
        ));
        *self.lock() = Some(Running { token, handle });
    }

    /// Stops ticking and waits for an in-flight tick to finish.
    pub async fn stop(&self) {
        let Some(run) = self.lock().take() else {
            return;
        };
        run.token.cancel();
        if let Err(e) = run.handle.await {
            if e.is_panic() {
                tracing::error!(error = %e, "dispatch timer loop panicked");
            }
        }
    }

    /// Whether a tick loop is active.
    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for DispatchTimer {
    fn drop(&mut self) {
        if let Some(run) = self.lock().take() {
            run.token.cancel();
        }
    }
}

async fn tick_loop(
    cycle: Arc<DispatchCycle>,
    session: Session,
    period: Duration,
    token: CancellationToken,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        if !session.is_alive() {
            break;
        }
        cycle.run_tick(&session).await;
    }
}
