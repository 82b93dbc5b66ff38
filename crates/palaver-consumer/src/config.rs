//! Provider configuration.

use std::{
    net::TcpListener,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    engine::{MockServerRequest, PactTarget},
    error::ConsumerError,
};

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Bound on the mock server readiness poll.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Consumer/provider pact configuration.
///
/// Unset fields take defaults when the provider is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginProviderConfig {
    /// Consumer name
    pub consumer: String,
    /// Provider name
    pub provider: String,
    /// Log directory (default `<cwd>/logs`)
    pub log_dir: Option<PathBuf>,
    /// Pact directory (default `<cwd>/pacts`)
    pub pact_dir: Option<PathBuf>,
    /// Host the mock server binds on (default `127.0.0.1`)
    pub host: Option<String>,
    /// Admin port (default: a free OS port)
    pub port: Option<u16>,
    /// Readiness poll bound (default 10 s)
    pub readiness_timeout: Option<Duration>,
}

impl PluginProviderConfig {
    /// Configuration for a consumer/provider pair with every default.
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self { consumer: consumer.into(), provider: provider.into(), ..Self::default() }
    }

    /// Resolve defaults against the working directory and validate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if:
    /// - Consumer or provider name is empty or contains a path separator
    /// - The working directory cannot be determined
    /// - A directory cannot be created
    /// - No free port can be obtained
    pub fn resolve(&self) -> Result<ResolvedConfig, ConsumerError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConsumerError::config(format!("cannot read working directory: {e}")))?;
        self.resolve_in(&cwd)
    }

    pub(crate) fn resolve_in(&self, cwd: &Path) -> Result<ResolvedConfig, ConsumerError> {
        check_pacticipant("consumer", &self.consumer)?;
        check_pacticipant("provider", &self.provider)?;

        let host = match self.host.as_deref() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => DEFAULT_HOST.to_string(),
        };

        let log_dir = self.log_dir.clone().unwrap_or_else(|| cwd.join("logs"));
        let pact_dir = self.pact_dir.clone().unwrap_or_else(|| cwd.join("pacts"));
        for dir in [&log_dir, &pact_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                ConsumerError::config(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let admin_port = match self.port {
            Some(port) if port != 0 => port,
            _ => free_port(&host).map_err(|e| {
                ConsumerError::config(format!("no free port available on {host}: {e}"))
            })?,
        };

        Ok(ResolvedConfig {
            consumer: self.consumer.clone(),
            provider: self.provider.clone(),
            log_dir,
            pact_dir,
            host,
            admin_port,
            readiness_timeout: self.readiness_timeout.unwrap_or(DEFAULT_READINESS_TIMEOUT),
        })
    }
}

/// Pacticipant names become part of the pact file name, so they must stay
/// inside the pact directory.
fn check_pacticipant(role: &str, name: &str) -> Result<(), ConsumerError> {
    if name.trim().is_empty() {
        return Err(ConsumerError::config(format!("{role} name must not be empty")));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ConsumerError::config(format!(
            "{role} name {name:?} must not contain path separators"
        )));
    }
    Ok(())
}

/// Configuration with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Consumer name
    pub consumer: String,
    /// Provider name
    pub provider: String,
    /// Log directory (exists)
    pub log_dir: PathBuf,
    /// Pact directory (exists)
    pub pact_dir: PathBuf,
    /// Host the mock server binds on
    pub host: String,
    /// Admin port identifying the mock server
    pub admin_port: u16,
    /// Readiness poll bound
    pub readiness_timeout: Duration,
}

impl ResolvedConfig {
    pub(crate) fn mock_server_request(&self) -> MockServerRequest {
        MockServerRequest {
            consumer: self.consumer.clone(),
            provider: self.provider.clone(),
            host: self.host.clone(),
            admin_port: self.admin_port,
            log_dir: self.log_dir.clone(),
            tls: false,
        }
    }

    pub(crate) fn pact_target(&self) -> PactTarget {
        PactTarget {
            dir: self.pact_dir.clone(),
            consumer: self.consumer.clone(),
            provider: self.provider.clone(),
        }
    }
}

/// Ask the OS for a port that is currently free on `host`.
///
/// The probe socket is closed before returning, so the port is free but not
/// reserved.
pub fn free_port(host: &str) -> std::io::Result<u16> {
    let probe = TcpListener::bind((host, 0))?;
    Ok(probe.local_addr()?.port())
}
