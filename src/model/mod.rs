//! Domain data model.
//!
//! - [`Event`]: one user-owned reminder entry with due time, priority and resolution state
//! - [`User`] / [`Recipient`]: the owner and the read view the scanner hands to dispatch
//! - [`OutstandingEvent`]: one scan result
//! - [`Notification`]: ephemeral recipient + rendered text for a single send attempt

mod event;
mod user;

pub use event::{Event, NewEvent, Priority, ResolutionState};
pub use user::{Notification, OutstandingEvent, Recipient, User};
