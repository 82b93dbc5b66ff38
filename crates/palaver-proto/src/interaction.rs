//! Expected interactions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MAX_MESSAGE_SIZE;

/// One expected inbound message and the canned response returned for it.
///
/// `message` is the lookup key: the transport trims each inbound message and
/// compares it for exact equality against the keys of the session's table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interaction {
    /// Inbound trigger, used as the unique key.
    pub message: String,
    /// Bytes returned verbatim on a match.
    pub response: String,
    /// Message framing hint. Advisory only; the transport does not frame.
    #[serde(default, alias = "delimeter")]
    pub delimiter: String,
}

/// Reasons an interaction is rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    /// The message key is empty.
    #[error("interaction message must not be empty")]
    EmptyMessage,

    /// The key has surrounding whitespace, so a trimmed inbound message can
    /// never equal it.
    #[error("interaction message '{message}' has leading or trailing whitespace")]
    UntrimmedMessage {
        /// The offending key.
        message: String,
    },

    /// The key is larger than one transport read.
    #[error("interaction message is {len} bytes, limit is {limit}")]
    MessageTooLarge {
        /// Key length in bytes.
        len: usize,
        /// Maximum accepted length.
        limit: usize,
    },
}

impl Interaction {
    /// Create an interaction with no delimiter.
    pub fn new(message: impl Into<String>, response: impl Into<String>) -> Self {
        Self { message: message.into(), response: response.into(), delimiter: String::new() }
    }

    /// Set the advisory delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Check that the message key can ever be matched by the transport.
    pub fn validate(&self) -> Result<(), InteractionError> {
        if self.message.is_empty() {
            return Err(InteractionError::EmptyMessage);
        }

        if self.message.trim() != self.message {
            return Err(InteractionError::UntrimmedMessage { message: self.message.clone() });
        }

        if self.message.len() > MAX_MESSAGE_SIZE {
            return Err(InteractionError::MessageTooLarge {
                len: self.message.len(),
                limit: MAX_MESSAGE_SIZE,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn valid_interaction_passes() {
        assert!(Interaction::new("PING", "PONG").validate().is_ok());
    }

    #[test]
    fn empty_message_rejected() {
        assert_eq!(Interaction::new("", "x").validate(), Err(InteractionError::EmptyMessage));
    }

    #[test]
    fn untrimmed_message_rejected() {
        let err = Interaction::new(" PING\n", "PONG").validate().unwrap_err();
        assert!(matches!(err, InteractionError::UntrimmedMessage { .. }));
    }

    #[test]
    fn oversized_message_rejected() {
        let message = "x".repeat(MAX_MESSAGE_SIZE + 1);
        let err = Interaction::new(message, "").validate().unwrap_err();
        assert_eq!(
            err,
            InteractionError::MessageTooLarge { len: MAX_MESSAGE_SIZE + 1, limit: MAX_MESSAGE_SIZE }
        );
    }

    #[test]
    fn legacy_delimiter_spelling_accepted() {
        let json = r#"{"message":"PING","response":"PONG","delimeter":"\n"}"#;
        let interaction: Interaction = serde_json::from_str(json).unwrap();
        assert_eq!(interaction.delimiter, "\n");
    }

    #[test]
    fn delimiter_defaults_to_empty() {
        let json = r#"{"message":"PING","response":"PONG"}"#;
        let interaction: Interaction = serde_json::from_str(json).unwrap();
        assert_eq!(interaction, Interaction::new("PING", "PONG"));
    }

    #[test]
    fn serializes_with_current_spelling() {
        let value = serde_json::to_value(Interaction::new("a", "b").with_delimiter(";")).unwrap();
        assert_eq!(value["delimiter"], ";");
        assert!(value.get("delimeter").is_none());
    }
}
