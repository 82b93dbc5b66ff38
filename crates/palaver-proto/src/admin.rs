//! Admin control plane request and response bodies.

use serde::{Deserialize, Serialize};

use crate::Interaction;

/// Body of `POST /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    /// Session identifier, the only admin-plane address for the session.
    pub id: String,
    /// Transport port the consumer connects to.
    pub port: u16,
    /// Port of the admin plane that owns the session.
    pub admin_port: u16,
}

/// Body of `POST /sessions/{id}/interactions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadInteractionsRequest {
    /// Replacement interaction table. Later duplicates of a message win.
    pub interactions: Vec<Interaction>,
}

/// Reply to a successful interaction load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadInteractionsResponse {
    /// Distinct message keys now expected by the session.
    pub loaded: usize,
}

/// Error payload for non-2xx admin responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Description of the failure.
    pub error: String,
}

impl ErrorBody {
    /// Wrap a message.
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
