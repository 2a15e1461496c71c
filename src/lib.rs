//! # remindvisor
//!
//! **Remindvisor** is a self-healing reminder dispatcher.
//!
//! Every minute it scans the event store for outstanding events and sends each owner a
//! reminder over a messaging transport session. The session is supervised: when it is
//! lost, or when it cannot be opened, the runtime waits out a fixed backoff and opens a
//! fresh one, indefinitely.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                  ┌────────────────────────────────────────────────────┐
//!                  │  Service (runtime wiring, graceful shutdown)       │
//!                  │  - Bus (broadcast events)                          │
//!                  │  - SubscriberSet (fans out to subscribers)         │
//!                  │  - LiveNotifier (interactive prompts, independent) │
//!                  └──────────────────────┬─────────────────────────────┘
//!                                         ▼
//!                  ┌────────────────────────────────────────────────────┐
//!                  │  ConnectionSupervisor (session lifecycle)          │
//!                  │  Disconnected → Connecting → Connected → Restarting│
//!                  └───────┬──────────────────────────────┬─────────────┘
//!                          │ connect / session.closed()   │ start / stop
//!                          ▼                              ▼
//!                  ┌───────────────┐              ┌────────────────┐
//!                  │   Transport   │◄──── send ───│ DispatchTimer  │
//!                  │ (HttpGateway) │              │ (every 60s)    │
//!                  └───────────────┘              └───────┬────────┘
//!                                                         ▼
//!                                                 ┌────────────────┐      ┌────────────┐
//!                                                 │ DispatchCycle  │─────►│  Scanner   │
//!                                                 │ (one tick)     │      │ EventStore │
//!                                                 └────────────────┘      └────────────┘
//!
//!   Supervisor, DispatchCycle ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                         ├─► LogWriter
//!                                                                         └─► custom
//! ```
//!
//! ### Lifecycle
//! ```text
//! loop {
//!   ├─► publish ConnectAttempt{ attempt }
//!   ├─► transport.connect() (bounded by connect_timeout)
//!   │       ├─ Ok  ──► publish Connected, timer.start(session)
//!   │       │          every interval: run_tick(&session)
//!   │       │            ├─ scan outstanding events (all of them, due or not)
//!   │       │            ├─ per event: format recipient, render, send (bounded by send_timeout)
//!   │       │            │    ├─ message-local failure ─► logged, batch continues
//!   │       │            │    └─ SessionLost           ─► session.terminate(), rest abandoned
//!   │       │            └─ publish TickCompleted{ report }
//!   │       │          session.closed() ─► timer.stop(), publish SessionLost
//!   │       └─ Err ──► publish ConnectFailed
//!   ├─► publish BackoffScheduled{ delay }
//!   └─► sleep(delay) (cancellable)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Keep one transport session alive with backoff.            | [`ConnectionSupervisor`], [`BackoffPolicy`] |
//! | **Dispatch**      | Scan, render and send reminders on a fixed interval.      | [`DispatchCycle`], [`DispatchTimer`]        |
//! | **Transport**     | Capability trait with explicit failure classification.    | [`Transport`], [`SendError`]                |
//! | **Store**         | Outstanding-event query over SQLite or memory.            | [`EventStore`], [`SqliteStore`]             |
//! | **Live prompts**  | Fire-and-forget prompts to connected clients.             | [`LiveNotifier`]                            |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom).      | [`Subscribe`], [`LogWriter`]                |
//! | **Configuration** | Environment-driven settings.                              | [`Config`]                                  |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use remindvisor::{Config, Service, SqliteStore, FakeTransport};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.store_url = "sqlite::memory:".into();
//!
//!     let store = SqliteStore::open_in_memory()?;
//!     let user = store.add_user("9876543210").await?;
//!     store
//!         .add_event(user, remindvisor::NewEvent::new("Dentist", chrono::Utc::now()))
//!         .await?;
//!
//!     let service = Service::builder(cfg)
//!         .with_store(Arc::new(store))
//!         .with_transport(Arc::new(FakeTransport::new()))
//!         .build()?;
//!
//!     // Runs until SIGINT/SIGTERM.
//!     service.run().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
pub mod dispatch;
mod error;
mod events;
pub mod live;
mod model;
mod policies;
mod scanner;
pub mod store;
mod subscribers;
pub mod transport;

// ---- Public re-exports ----

pub use crate::core::{
    ConnectionSupervisor, Service, ServiceBuilder, SupervisorParams, SupervisorState,
};
pub use config::{Config, GatewayConfig, keys as config_keys};
pub use dispatch::{
    DispatchCycle, DispatchSettings, DispatchTimer, TickOutcome, TickReport, render_reminder,
};
pub use error::{ConfigError, ConnectError, RuntimeError, ScanError, SendError, StoreError};
pub use events::{Bus, Event, EventKind};
pub use live::{LiveAction, LiveEvent, LiveNotifier, LivePrompt, LiveSubscription};
pub use model::{
    Event as ReminderEvent, NewEvent, Notification, OutstandingEvent, Priority, Recipient,
    ResolutionState, User,
};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use scanner::Scanner;
pub use store::{EventStore, MemoryStore, SqliteStore};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use transport::{
    FakeSend, FakeTransport, HttpGateway, SentMessage, Session, SessionConfig, Transport,
};
