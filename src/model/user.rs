//! # Users, scan results and notifications.

use serde::{Deserialize, Serialize};

use super::Event;

/// A user and the events they own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Messaging address in local format (e.g. `9876543210`).
    pub address: String,
    /// Owned events; order is irrelevant for dispatch.
    pub events: Vec<Event>,
}

impl User {
    /// Read view handed to the dispatch cycle.
    pub fn recipient(&self) -> Recipient {
        Recipient {
            user_id: self.id,
            address: self.address.clone(),
        }
    }

    /// Outstanding events of this user as scan results.
    pub fn outstanding(&self) -> impl Iterator<Item = OutstandingEvent> + '_ {
        self.events
            .iter()
            .filter(|e| e.is_outstanding())
            .map(|e| OutstandingEvent {
                recipient: self.recipient(),
                event: e.clone(),
            })
    }
}

/// Immutable per-tick view of the owning user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: i64,
    pub address: String,
}

/// One scan result: an outstanding event and who to remind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingEvent {
    pub recipient: Recipient,
    pub event: Event,
}

/// Rendered message bound for one recipient.
///
/// Lives only for the duration of one send attempt; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Transport recipient (prefix already applied).
    pub recipient: String,
    pub text: String,
}
