//! Interaction matcher.
//!
//! Exact-key lookup of an inbound message against a session's expected
//! interactions. An inbound message with no expected interaction yields an
//! empty response and is NOT recorded anywhere: only expected interactions
//! that never arrive become mismatches.

use crate::session::Session;

/// Result of matching one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The trimmed message equals an expected key.
    Matched {
        /// Key that matched.
        message: String,
        /// Configured response.
        response: String,
    },

    /// No expected interaction for this message.
    Unmatched {
        /// Trimmed message that was looked up.
        message: String,
    },
}

impl MatchOutcome {
    /// Bytes to write back to the client; empty when unmatched.
    pub fn into_response(self) -> String {
        match self {
            Self::Matched { response, .. } => response,
            Self::Unmatched { .. } => String::new(),
        }
    }

    /// Whether the message matched.
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Strip incidental whitespace and line framing from a raw message.
pub fn normalize(raw: &str) -> &str {
    raw.trim()
}

/// Match `raw` against `session`, recording the key on a hit.
///
/// Matching the same key again appends it again.
pub fn match_message(session: &mut Session, raw: &str) -> MatchOutcome {
    let message = normalize(raw);

    let Some(response) = session.expected(message).map(|i| i.response.clone()) else {
        tracing::debug!(session_id = %session.id(), inbound = message, "no expected interaction");
        return MatchOutcome::Unmatched { message: message.to_string() };
    };

    session.record_match(message);
    tracing::debug!(session_id = %session.id(), inbound = message, "matched interaction");

    MatchOutcome::Matched { message: message.to_string(), response }
}
