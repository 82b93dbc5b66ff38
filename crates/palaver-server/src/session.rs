//! Session state.
//!
//! A session is one isolated instance of the plugin transport mock: its own
//! listen address, expected-interaction table and match history.
//!
//! # Invariants
//!
//! - Every entry of `matched` is a key of `expected`. [`Session::record_match`]
//!   refuses unknown keys and [`Session::load_interactions`] prunes keys that
//!   the replacement table no longer contains.
//! - Interaction keys are unique; a later duplicate in a load replaces the
//!   earlier one.

use std::{collections::HashMap, fmt, net::SocketAddr};

use palaver_proto::{Interaction, InteractionError};

/// Opaque session identifier (UUID v4 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Plugin transport session.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    listen_address: SocketAddr,
    /// Expected interactions keyed by message text
    expected: HashMap<String, Interaction>,
    /// Keys matched so far, in completion order (may repeat)
    matched: Vec<String>,
}

impl Session {
    /// Create an empty session bound to `listen_address`.
    pub fn new(id: SessionId, listen_address: SocketAddr) -> Self {
        Self { id, listen_address, expected: HashMap::new(), matched: Vec::new() }
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Address the transport listener is bound to.
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Look up the expected interaction for an exact message key.
    pub fn expected(&self, message: &str) -> Option<&Interaction> {
        self.expected.get(message)
    }

    /// Iterate over expected message keys (unordered).
    pub fn expected_messages(&self) -> impl Iterator<Item = &str> {
        self.expected.keys().map(String::as_str)
    }

    /// Number of distinct expected messages.
    pub fn expected_len(&self) -> usize {
        self.expected.len()
    }

    /// Matched keys in the order matches completed.
    pub fn matched(&self) -> &[String] {
        &self.matched
    }

    /// Replace the interaction table.
    ///
    /// All interactions are validated before anything changes; a single
    /// invalid entry leaves the session untouched. Returns the number of
    /// distinct keys now expected.
    pub fn load_interactions(
        &mut self,
        interactions: Vec<Interaction>,
    ) -> Result<usize, InteractionError> {
        for interaction in &interactions {
            interaction.validate()?;
        }

        let expected: HashMap<String, Interaction> =
            interactions.into_iter().map(|i| (i.message.clone(), i)).collect();

        self.matched.retain(|key| expected.contains_key(key));
        self.expected = expected;

        Ok(self.expected.len())
    }

    /// Append `message` to the match history if it is an expected key.
    ///
    /// Returns `false` (and records nothing) for unknown keys.
    pub fn record_match(&mut self, message: &str) -> bool {
        if !self.expected.contains_key(message) {
            return false;
        }

        self.matched.push(message.to_string());
        true
    }
}
