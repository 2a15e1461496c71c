//! # Reminder events.
//!
//! An [`Event`] belongs to exactly one user. The dispatch core only reads events;
//! the event-management collaborator creates, edits, resolves and deletes them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolution state of an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    /// Still needs attention; reminded on every tick.
    #[default]
    Outstanding,
    /// Done; never reminded again.
    Resolved,
}

impl ResolutionState {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionState::Outstanding => "outstanding",
            ResolutionState::Resolved => "resolved",
        }
    }
}

impl FromStr for ResolutionState {
    type Err = String;

    /// Accepts `outstanding` / `incomplete` and `resolved` / `complete`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outstanding" | "incomplete" => Ok(ResolutionState::Outstanding),
            "resolved" | "complete" => Ok(ResolutionState::Resolved),
            other => Err(format!("unknown resolution state {other:?}")),
        }
    }
}

/// Event priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::High => "High",
            Priority::Normal => "Normal",
            Priority::Low => "Low",
        })
    }
}

impl FromStr for Priority {
    type Err = String;

    /// Accepts `high`, `normal` (alias `medium`) and `low`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "normal" | "medium" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority {other:?}")),
        }
    }
}

/// A user-owned reminder entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier, unique within the owning user.
    pub id: i64,
    pub name: String,
    /// Due date and time, normalized to UTC.
    pub due: DateTime<Utc>,
    pub description: Option<String>,
    pub state: ResolutionState,
    pub priority: Option<Priority>,
}

impl Event {
    /// True while the event still gets reminders.
    #[inline]
    pub fn is_outstanding(&self) -> bool {
        self.state == ResolutionState::Outstanding
    }
}

/// Input for creating an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub due: DateTime<Utc>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
}

impl NewEvent {
    /// Creates an event with only the required fields.
    pub fn new(name: impl Into<String>, due: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            due,
            description: None,
            priority: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Materializes the event under the given id, outstanding.
    pub fn into_event(self, id: i64) -> Event {
        Event {
            id,
            name: self.name,
            due: self.due,
            description: self.description,
            state: ResolutionState::Outstanding,
            priority: self.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_accepts_medium_alias() {
        assert_eq!("Medium".parse::<Priority>(), Ok(Priority::Normal));
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::Normal.to_string(), "Normal");
    }

    #[test]
    fn test_state_accepts_legacy_names() {
        assert_eq!(
            "incomplete".parse::<ResolutionState>(),
            Ok(ResolutionState::Outstanding)
        );
        assert_eq!(
            "complete".parse::<ResolutionState>(),
            Ok(ResolutionState::Resolved)
        );
    }
}
