//! Live notifications: interactive "remind me later" prompts for connected clients.
//!
//! Independent from dispatch: a failure here never affects a tick, and a tick never
//! waits on a live client.
//!
//! ## Contents
//! - [`LiveNotifier`] address-keyed registry with fire-and-forget [`LiveNotifier::emit`]
//! - [`LivePrompt`], [`LiveEvent`], [`LiveAction`] payloads

mod notifier;
mod prompt;

pub use notifier::{LiveNotifier, LiveSubscription};
pub use prompt::{LiveAction, LiveEvent, LivePrompt};
