//! Sender attribution for transcript lines.
//!
//! Both participants write with the `user` role, so the sender is carried
//! in the content itself: user messages are prefixed `[<Name>]: ` and
//! assistant messages never are. This module is the single source of truth
//! for producing and interpreting that prefix.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::role::Role;

/// Fallback label for a user message whose prefix cannot be parsed
/// (malformed or pre-convention data).
pub const UNKNOWN_SENDER: &str = "Unknown";

static PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(.+?)\]:\s*").expect("valid prefix regex"));

/// How a transcript line relates to the local participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    Assistant,
    Me,
    Partner,
}

/// Prefix a user message with its sender's display name.
pub fn prefix_sender(name: &str, text: &str) -> String {
    format!("[{}]: {}", name, text)
}

/// Classify a message for the participant whose display name is `my_name`.
pub fn classify(role: Role, content: &str, my_name: &str) -> Attribution {
    match role {
        Role::Assistant => Attribution::Assistant,
        Role::User => match sender_name(content) {
            Some(name) if name == my_name => Attribution::Me,
            _ => Attribution::Partner,
        },
    }
}

/// The display name parsed from a user message's prefix, if any.
pub fn sender_name(content: &str) -> Option<&str> {
    PREFIX_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The sender label to show for a user message, falling back to
/// [`UNKNOWN_SENDER`] when the prefix cannot be parsed.
pub fn sender_label(content: &str) -> &str {
    sender_name(content).unwrap_or(UNKNOWN_SENDER)
}

/// Strip the sender prefix for display. Content without a prefix is
/// returned unchanged.
pub fn strip_sender_prefix(content: &str) -> &str {
    match PREFIX_RE.find(content) {
        Some(m) => &content[m.end()..],
        None => content,
    }
}
