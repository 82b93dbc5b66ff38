//! Mock engine collaborator.
//!
//! The orchestrator never matches or verifies anything itself. It drives a
//! [`MockEngine`], which owns the mock server behind one admin port: start,
//! load interactions, verify, persist the pact, release.
//!
//! Native HTTP engines report outcomes as integer status codes;
//! [`EngineError::from_create_status`] and [`EngineError::from_write_status`]
//! map those onto typed errors so a binding can return them directly.

use std::path::PathBuf;

use async_trait::async_trait;
use palaver_proto::{Interaction, MismatchDetail};
use thiserror::Error;

/// Errors reported by a mock engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Engine rejected the server configuration.
    #[error("mock server configuration was invalid")]
    InvalidConfig,

    /// Engine rejected the pact it was handed.
    #[error("pact handed to the mock server was invalid")]
    InvalidPact,

    /// Mock server could not be started.
    #[error("unable to start mock server: {reason}")]
    UnableToStart {
        /// Description of the start failure.
        reason: String,
    },

    /// Engine panicked.
    #[error("mock engine panicked")]
    Panic,

    /// Address could not be parsed or bound.
    #[error("invalid mock server address")]
    InvalidAddress,

    /// TLS mock server could not be configured.
    #[error("TLS configuration for the mock server failed")]
    TlsConfiguration,

    /// Pact file could not be written.
    #[error("unable to write pact file: {reason}")]
    WriteFailed {
        /// Description of the write failure.
        reason: String,
    },

    /// No mock server is running on the port.
    #[error("no mock server running on port {port}")]
    ServerNotFound {
        /// Admin port that was looked up.
        port: u16,
    },

    /// Admin plane does not know the session.
    #[error("session not found: {id}")]
    SessionNotFound {
        /// Session id that was not found.
        id: String,
    },

    /// Admin plane request failed.
    #[error("admin request failed: {reason}")]
    Admin {
        /// Description of the request failure.
        reason: String,
    },

    /// Status code outside the documented set.
    #[error("unknown mock engine status {code}")]
    Unknown {
        /// Raw status code.
        code: i32,
    },
}

impl EngineError {
    /// Decode the status returned when creating a mock server.
    ///
    /// Positive values are the port the server listens on.
    pub fn from_create_status(status: i32) -> Result<u16, Self> {
        match status {
            -1 => Err(Self::InvalidConfig),
            -2 => Err(Self::InvalidPact),
            -3 => Err(Self::UnableToStart { reason: "engine could not start the server".into() }),
            -4 => Err(Self::Panic),
            -5 => Err(Self::InvalidAddress),
            -6 => Err(Self::TlsConfiguration),
            code if code > 0 => u16::try_from(code).map_err(|_| Self::Unknown { code }),
            code => Err(Self::Unknown { code }),
        }
    }

    /// Decode the status returned when writing a pact file for `port`.
    pub fn from_write_status(status: i32, port: u16) -> Result<(), Self> {
        match status {
            0 => Ok(()),
            1 => Err(Self::Panic),
            2 => Err(Self::write_failed("engine could not write the pact file")),
            3 => Err(Self::ServerNotFound { port }),
            code => Err(Self::Unknown { code }),
        }
    }

    /// Write failure with a reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed { reason: reason.into() }
    }
}

/// Everything an engine needs to start one mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerRequest {
    /// Consumer name recorded in the pact.
    pub consumer: String,
    /// Provider name recorded in the pact.
    pub provider: String,
    /// Host to bind on.
    pub host: String,
    /// Port that identifies the mock server for every later call.
    pub admin_port: u16,
    /// Directory for engine logs.
    pub log_dir: PathBuf,
    /// Serve over TLS.
    pub tls: bool,
}

/// Verification result for one mock server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    /// Engine's overall verdict.
    pub matched: bool,
    /// Individual mismatches, in engine order.
    pub mismatches: Vec<MismatchDetail>,
}

impl Verification {
    /// Clean verification.
    pub fn passed() -> Self {
        Self { matched: true, mismatches: Vec::new() }
    }

    /// Failed verification carrying `mismatches`.
    pub fn failed(mismatches: Vec<MismatchDetail>) -> Self {
        Self { matched: false, mismatches }
    }

    /// A negative verdict or any mismatch fails the contract.
    pub fn is_success(&self) -> bool {
        self.matched && self.mismatches.is_empty()
    }
}

/// Where a pact file is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PactTarget {
    /// Pact directory.
    pub dir: PathBuf,
    /// Consumer name.
    pub consumer: String,
    /// Provider name.
    pub provider: String,
}

impl PactTarget {
    /// `<dir>/<consumer>-<provider>.json`
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(format!("{}-{}.json", self.consumer, self.provider))
    }
}

/// Mock server engine driven by the orchestrator.
///
/// Every mock server is addressed by the admin port it was started on.
#[async_trait]
pub trait MockEngine: Send + Sync {
    /// Start a mock server and return the port consumers connect to.
    async fn start_mock_server(&self, request: &MockServerRequest) -> Result<u16, EngineError>;

    /// Register the interactions the mock server should expect.
    async fn add_interactions(
        &self,
        admin_port: u16,
        interactions: &[Interaction],
    ) -> Result<(), EngineError>;

    /// Compare what the mock server saw against what it expected.
    async fn verify(&self, admin_port: u16) -> Result<Verification, EngineError>;

    /// Merge `interactions` into the pact file at `target`.
    ///
    /// Must be idempotent: writing the same interactions twice leaves one
    /// copy of each in the artifact.
    async fn write_pact_file(
        &self,
        target: &PactTarget,
        interactions: &[Interaction],
    ) -> Result<(), EngineError>;

    /// Release the mock server. Returns false if nothing was running.
    fn cleanup_mock_server(&self, admin_port: u16) -> bool;

    /// CA certificate (PEM) for TLS mock servers.
    fn tls_certificate_authority(&self) -> Option<Vec<u8>> {
        None
    }
}
