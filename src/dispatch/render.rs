//! # Reminder text.
//!
//! ```text
//! ⏰ Reminder: "Dentist"
//! 📅 02 Jan 2030, 09:30 UTC
//! 📝 Bring the x-rays
//! Priority: High
//! ```

use crate::model::{Event, Priority};

/// Due time layout used in reminder text.
pub const DUE_FORMAT: &str = "%d %b %Y, %H:%M UTC";

const NO_DESCRIPTION: &str = "No description";

/// Renders the reminder text for one event.
///
/// A missing or blank description renders as `No description`; a missing priority
/// renders as `Normal`.
pub fn render_reminder(event: &Event) -> String {
    let description = event
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(NO_DESCRIPTION);
    let priority = event.priority.unwrap_or(Priority::Normal);

    format!(
        "⏰ Reminder: \"{}\"\n📅 {}\n📝 {}\nPriority: {}",
        event.name,
        event.due.format(DUE_FORMAT),
        description,
        priority
    )
}
