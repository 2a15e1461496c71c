//! # Interactive prompt payloads.
//!
//! Wire shape of a prompt pushed to a live client:
//! ```json
//! {
//!   "phoneNumber": "9876543210",
//!   "message": "Reminder: Dentist at 09:30",
//!   "options": ["Done", "Remind me later"]
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the emitter is asked to announce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub name: String,
    /// Display time as supplied by the caller.
    pub time: String,
}

/// Prompt delivered to every live subscriber of one address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePrompt {
    pub phone_number: String,
    pub message: String,
    pub options: Vec<String>,
}

impl LivePrompt {
    /// Builds the prompt for `event` addressed to `address`.
    pub fn new(address: &str, event: &LiveEvent) -> Self {
        Self {
            phone_number: address.to_string(),
            message: format!("Reminder: {} at {}", event.name, event.time),
            options: LiveAction::ALL.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Answer a client gives to a prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiveAction {
    Done,
    RemindLater,
}

impl LiveAction {
    /// Options offered in every prompt, in display order.
    pub const ALL: [LiveAction; 2] = [LiveAction::Done, LiveAction::RemindLater];

    pub fn as_str(&self) -> &'static str {
        match self {
            LiveAction::Done => "Done",
            LiveAction::RemindLater => "Remind me later",
        }
    }
}

impl fmt::Display for LiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiveAction {
    type Err = String;

    /// Case-insensitive match on the option labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        LiveAction::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown prompt answer {s:?}"))
    }
}
