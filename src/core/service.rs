//! # Service: wires the runtime together and owns graceful shutdown.
//!
//! The [`Service`] owns the event bus, the [`SubscriberSet`], the
//! [`ConnectionSupervisor`] and the [`LiveNotifier`].
//!
//! ## High-level architecture
//! ```text
//! Config ──► ServiceBuilder::build() ──► Service::run()
//!
//! Preparation:
//!   - subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)   (fire-and-forget)
//!   - spawn ConnectionSupervisor::run(child token)
//!
//! Event flow:
//!   Supervisor / DispatchCycle ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                                   ┌─────────┼─────────┐
//!                                                                   ▼         ▼         ▼
//!                                                              [queue S1] [queue S2] [queue SN]
//!
//! Shutdown path:
//!   OS signal | shutdown_token().cancel()
//!             └─► Bus.publish(ShutdownRequested)
//!             └─► runtime_token.cancel()      → supervisor stops timer, closes session
//!             └─► wait_with_grace(cfg.grace):
//!                    ├─ Ok (joined)      → Bus.publish(AllStoppedWithin)
//!                    └─ Timeout exceeded → Bus.publish(GraceExceeded), Err(GraceExceeded)
//!             └─► flush subscribers
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{builder::ServiceBuilder, shutdown, supervisor::ConnectionSupervisor};
use crate::{
    config::Config,
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    live::LiveNotifier,
    subscribers::SubscriberSet,
};

/// The assembled reminder runtime.
pub struct Service {
    cfg: Config,
    bus: Bus,
    subs: SubscriberSet,
    supervisor: Arc<ConnectionSupervisor>,
    live: Arc<LiveNotifier>,
    runtime_token: CancellationToken,
}

impl Service {
    /// Starts building a service from `cfg`.
    pub fn builder(cfg: Config) -> ServiceBuilder {
        ServiceBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: SubscriberSet,
        supervisor: Arc<ConnectionSupervisor>,
        live: Arc<LiveNotifier>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            supervisor,
            live,
            runtime_token: CancellationToken::new(),
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus; subscribe here to observe the runtime directly.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The connection supervisor (state observation).
    pub fn supervisor(&self) -> Arc<ConnectionSupervisor> {
        Arc::clone(&self.supervisor)
    }

    /// Live notifier for interactive prompts.
    pub fn live(&self) -> Arc<LiveNotifier> {
        Arc::clone(&self.live)
    }

    /// Token that triggers the same graceful shutdown as an OS signal.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.runtime_token.clone()
    }

    /// Runs until a termination signal arrives or [`Service::shutdown_token`] is cancelled.
    pub async fn run(self) -> Result<(), RuntimeError> {
        self.run_until(async {
            let signal = shutdown::wait_for_shutdown_signal().await?;
            tracing::info!(signal, "termination signal received");
            Ok(())
        })
        .await
    }

    /// Runs until `stop` resolves (or the shutdown token is cancelled), then shuts down
    /// gracefully.
    ///
    /// An error from `stop` is returned after shutdown completes.
    pub async fn run_until<F>(self, stop: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = Result<(), RuntimeError>>,
    {
        let Service {
            cfg,
            bus,
            subs,
            supervisor,
            live: _,
            runtime_token,
        } = self;

        let listener_stop = CancellationToken::new();
        let listener = subscriber_listener(&bus, subs, listener_stop.clone());

        let child = runtime_token.child_token();
        let handle = tokio::spawn(async move { supervisor.run(child).await });

        let stopped = tokio::select! {
            res = stop => res,
            _ = runtime_token.cancelled() => Ok(()),
        };

        bus.publish(Event::new(EventKind::ShutdownRequested));
        runtime_token.cancel();
        let drained = wait_with_grace(&bus, cfg.shutdown_grace(), handle).await;

        listener_stop.cancel();
        match listener.await {
            Ok(subs) => subs.shutdown().await,
            Err(e) => tracing::error!(error = %e, "subscriber listener failed"),
        }

        drained.and(stopped)
    }
}

/// Forwards bus events to the subscriber set until `stop` fires, then drains what is
/// already queued and hands the set back for flushing.
fn subscriber_listener(
    bus: &Bus,
    set: SubscriberSet,
    stop: CancellationToken,
) -> JoinHandle<SubscriberSet> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    break;
                }
            }
        }
        set
    })
}

/// Waits for the supervisor to stop within `grace` (`None` = do not wait).
async fn wait_with_grace(
    bus: &Bus,
    grace: Option<Duration>,
    handle: JoinHandle<()>,
) -> Result<(), RuntimeError> {
    let Some(grace) = grace else {
        handle.abort();
        bus.publish(Event::new(EventKind::AllStoppedWithin));
        return Ok(());
    };

    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(joined) => {
            if let Err(e) = joined {
                tracing::error!(error = %e, "supervisor task failed");
            }
            bus.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        }
        Err(_elapsed) => {
            abort.abort();
            bus.publish(Event::new(EventKind::GraceExceeded));
            Err(RuntimeError::GraceExceeded { grace })
        }
    }
}
