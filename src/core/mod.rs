//! Runtime core: orchestration and lifecycle.
//!
//! Internal modules:
//! - [`supervisor`]: keeps one transport session alive, restarts it with backoff;
//! - [`service`]: wires store, transport, dispatch and subscribers; graceful shutdown;
//! - [`builder`]: assembles a [`Service`] from [`Config`](crate::Config);
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod service;
mod shutdown;
mod supervisor;

pub use builder::ServiceBuilder;
pub use service::Service;
pub use supervisor::{ConnectionSupervisor, SupervisorParams, SupervisorState};
