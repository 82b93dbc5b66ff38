//! Palaver plugin mock server.
//!
//! A session-oriented mock for non-HTTP transports. A test framework creates a
//! session over the admin plane, loads the interactions it expects, lets the
//! consumer under test talk to the session's TCP port, then asks which
//! expected interactions never arrived.
//!
//! ## Architecture
//!
//! ```text
//! palaver-server
//!   ├─ AdminServer       (axum admin control plane)
//!   ├─ SessionRegistry   (id -> session, one lock per session)
//!   ├─ session worker    (queue of bound sockets -> accept loops)
//!   ├─ listener          (one task per session, one per connection)
//!   ├─ matcher           (exact-key lookup, records matches)
//!   └─ mismatch          (expected \ matched)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admin;
mod error;
mod listener;
pub mod matcher;
pub mod mismatch;
mod registry;
mod server;
mod session;

pub use admin::AdminError;
pub use error::ServerError;
pub use matcher::MatchOutcome;
pub use registry::{NewSession, RegistryError, SessionRegistry};
pub use server::{AdminHandle, AdminServer};
pub use session::{Session, SessionId};

/// Plugin server configuration.
#[derive(Debug, Clone)]
pub struct PluginServerConfig {
    /// Address the admin plane binds to (e.g., "127.0.0.1:4444")
    pub bind_address: String,
    /// Host that session transport sockets bind on
    pub session_host: String,
}

impl Default for PluginServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1:4444".to_string(), session_host: "127.0.0.1".to_string() }
    }
}

impl PluginServerConfig {
    /// Admin plane on `host:port`, sessions on `host`.
    pub fn on(host: &str, port: u16) -> Self {
        Self { bind_address: format!("{host}:{port}"), session_host: host.to_string() }
    }
}
