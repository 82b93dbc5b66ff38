//! Palaver consumer-side orchestration.
//!
//! Drives one consumer contract test at a time against a mock provider:
//!
//! ```text
//! PluginProvider::execute_test
//!   ├─ MockEngine::start_mock_server   (cleanup guaranteed from here on)
//!   ├─ readiness poll                  (bounded, default 10 s)
//!   ├─ MockEngine::add_interactions    (pending list reset on every exit)
//!   ├─ consumer test callback          (gets a MockServerConfig)
//!   ├─ MockEngine::verify
//!   └─ MockEngine::write_pact_file
//! ```
//!
//! [`PluginEngine`] is the engine for plugin transports: it hosts a
//! `palaver-server` admin plane in-process and talks to it over HTTP. Other
//! engines (for example a binding to a native HTTP mock engine) implement
//! [`MockEngine`] themselves.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admin_client;
mod config;
mod engine;
mod error;
mod mock_server;
pub mod pact;
mod plugin_engine;
mod provider;
mod readiness;

pub use admin_client::AdminClient;
pub use config::{
    DEFAULT_HOST, DEFAULT_READINESS_TIMEOUT, PluginProviderConfig, ResolvedConfig, free_port,
};
pub use engine::{EngineError, MockEngine, MockServerRequest, PactTarget, Verification};
pub use error::{BoxError, ConsumerError};
pub use mock_server::MockServerConfig;
pub use palaver_proto::{Interaction, MismatchDetail};
pub use plugin_engine::PluginEngine;
pub use provider::{Outcome, PluginProvider, ProviderState};
pub use readiness::wait_for_port;
