//! Consumer error types.

use std::time::Duration;

use palaver_proto::{InteractionError, MismatchDetail};
use thiserror::Error;

use crate::engine::EngineError;

/// Boxed error returned by consumer test callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from contract test orchestration.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Configuration could not be resolved or validated.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration problem.
        reason: String,
    },

    /// Interaction rejected before it reached the mock engine.
    #[error("invalid interaction: {0}")]
    InvalidInteraction(#[from] InteractionError),

    /// Mock server could not be started or verified.
    #[error("mock server lifecycle error: {0}")]
    MockServerLifecycle(#[source] EngineError),

    /// Mock server never accepted connections.
    #[error("mock server at {host}:{port} not ready after {timeout:?}")]
    ReadinessTimeout {
        /// Host that was polled.
        host: String,
        /// Port that was polled.
        port: u16,
        /// Bound on the poll.
        timeout: Duration,
    },

    /// Interactions could not be loaded into the mock server.
    #[error("failed to load interactions: {0}")]
    InteractionLoad(#[source] EngineError),

    /// Consumer test code failed.
    #[error("test callback failed: {0}")]
    Callback(#[source] BoxError),

    /// Mock server observed a contract violation.
    #[error("contract verification failed with {} mismatch(es)", mismatches.len())]
    ContractVerificationFailed {
        /// Mismatches reported by the engine.
        mismatches: Vec<MismatchDetail>,
    },

    /// Verification passed but the pact could not be persisted.
    #[error("failed to write pact file: {0}")]
    ArtifactWrite(#[source] EngineError),
}

impl ConsumerError {
    /// Returns true if the consumer test itself passed.
    ///
    /// Only an artifact write failure happens after a successful
    /// verification; every other variant means the test did not pass.
    pub fn test_passed(&self) -> bool {
        matches!(self, Self::ArtifactWrite(_))
    }

    /// Mismatches carried by a verification failure, if any.
    pub fn mismatches(&self) -> Option<&[MismatchDetail]> {
        match self {
            Self::ContractVerificationFailed { mismatches } => Some(mismatches),
            _ => None,
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration { reason: reason.into() }
    }
}
