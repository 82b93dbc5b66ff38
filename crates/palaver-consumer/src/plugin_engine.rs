//! Mock engine for plugin transports.
//!
//! Each started mock server is an in-process `palaver-server` admin plane on
//! the requested admin port with a single session. Interactions, verification
//! and teardown go over the admin plane's HTTP API, the same way an external
//! framework would drive a standalone plugin server.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use palaver_proto::Interaction;
use palaver_server::{AdminHandle, AdminServer, PluginServerConfig, ServerError};

use crate::{
    admin_client::AdminClient,
    engine::{EngineError, MockEngine, MockServerRequest, PactTarget, Verification},
    pact::PactFile,
};

/// A released admin plane closes its socket once its aborted task is polled,
/// so a rebind of the same port may briefly see it in use.
const BIND_ATTEMPTS: u32 = 25;
const BIND_RETRY_INTERVAL: Duration = Duration::from_millis(20);

struct RunningServer {
    /// Dropping the handle stops the admin plane and the session listener
    _admin: AdminHandle,
    client: AdminClient,
    session_id: String,
}

/// Engine backed by in-process plugin servers.
#[derive(Default)]
pub struct PluginEngine {
    servers: Mutex<HashMap<u16, RunningServer>>,
}

impl PluginEngine {
    /// Engine with no running servers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of running mock servers.
    pub fn running(&self) -> usize {
        self.servers().len()
    }

    /// Returns true if a mock server is running on `admin_port`.
    pub fn is_running(&self, admin_port: u16) -> bool {
        self.servers().contains_key(&admin_port)
    }

    fn servers(&self) -> MutexGuard<'_, HashMap<u16, RunningServer>> {
        self.servers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self, admin_port: u16) -> Result<(AdminClient, String), EngineError> {
        self.servers()
            .get(&admin_port)
            .map(|server| (server.client.clone(), server.session_id.clone()))
            .ok_or(EngineError::ServerNotFound { port: admin_port })
    }
}

impl std::fmt::Debug for PluginEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ports: Vec<u16> = self.servers().keys().copied().collect();
        ports.sort_unstable();
        f.debug_struct("PluginEngine").field("admin_ports", &ports).finish()
    }
}

async fn bind_admin(host: &str, admin_port: u16) -> Result<AdminServer, EngineError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match AdminServer::bind(PluginServerConfig::on(host, admin_port)).await {
            Ok(server) => return Ok(server),
            Err(ServerError::Transport(reason)) if attempts < BIND_ATTEMPTS => {
                tracing::trace!(admin_port, attempts, "admin bind failed: {}", reason);
                tokio::time::sleep(BIND_RETRY_INTERVAL).await;
            },
            Err(e) => return Err(EngineError::UnableToStart { reason: e.to_string() }),
        }
    }
}

#[async_trait]
impl MockEngine for PluginEngine {
    async fn start_mock_server(&self, request: &MockServerRequest) -> Result<u16, EngineError> {
        if request.tls {
            return Err(EngineError::TlsConfiguration);
        }
        if self.is_running(request.admin_port) {
            return Err(EngineError::UnableToStart {
                reason: format!("admin port {} already in use", request.admin_port),
            });
        }

        let server = bind_admin(&request.host, request.admin_port).await?;
        let admin = server.spawn().map_err(|e| EngineError::UnableToStart { reason: e.to_string() })?;

        let client = AdminClient::new(admin.local_addr());
        let session = client.create_session().await?;

        tracing::info!(
            consumer = %request.consumer,
            provider = %request.provider,
            admin_port = request.admin_port,
            port = session.port,
            session_id = %session.id,
            "plugin mock server started"
        );

        let port = session.port;
        self.servers()
            .insert(request.admin_port, RunningServer { _admin: admin, client, session_id: session.id });
        Ok(port)
    }

    async fn add_interactions(
        &self,
        admin_port: u16,
        interactions: &[Interaction],
    ) -> Result<(), EngineError> {
        let (client, session_id) = self.session(admin_port)?;
        let loaded = client.load_interactions(&session_id, interactions).await?;
        tracing::debug!(admin_port, loaded, "interactions loaded");
        Ok(())
    }

    async fn verify(&self, admin_port: u16) -> Result<Verification, EngineError> {
        let (client, session_id) = self.session(admin_port)?;
        let mismatches = client.mismatches(&session_id).await?;

        if mismatches.is_empty() {
            Ok(Verification::passed())
        } else {
            Ok(Verification::failed(mismatches))
        }
    }

    async fn write_pact_file(
        &self,
        target: &PactTarget,
        interactions: &[Interaction],
    ) -> Result<(), EngineError> {
        PactFile::write_merged(target, interactions).await.map(|_| ())
    }

    fn cleanup_mock_server(&self, admin_port: u16) -> bool {
        let removed = self.servers().remove(&admin_port);
        match removed {
            Some(server) => {
                tracing::debug!(admin_port, session_id = %server.session_id, "plugin mock server released");
                true
            },
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use palaver_proto::MismatchDetail;

    use super::*;
    use crate::{MockServerConfig, free_port};

    fn request(admin_port: u16) -> MockServerRequest {
        MockServerRequest {
            consumer: "billing".to_string(),
            provider: "ledger".to_string(),
            host: "127.0.0.1".to_string(),
            admin_port,
            log_dir: PathBuf::from("logs"),
            tls: false,
        }
    }

    fn endpoint(port: u16) -> MockServerConfig {
        MockServerConfig { host: "127.0.0.1".to_string(), port, tls_certificate: None }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_load_send_verify() {
        let engine = PluginEngine::new();
        let admin_port = free_port("127.0.0.1").unwrap();

        let port = engine.start_mock_server(&request(admin_port)).await.unwrap();
        assert_ne!(port, admin_port);
        assert!(engine.is_running(admin_port));

        engine
            .add_interactions(
                admin_port,
                &[Interaction::new("PING", "PONG"), Interaction::new("STATUS", "UP")],
            )
            .await
            .unwrap();
        assert_eq!(endpoint(port).send("PING").await.unwrap(), "PONG");

        let verification = engine.verify(admin_port).await.unwrap();
        assert!(!verification.is_success());
        assert_eq!(verification.mismatches, vec![MismatchDetail::missing("STATUS")]);

        assert!(engine.cleanup_mock_server(admin_port));
        assert!(!engine.cleanup_mock_server(admin_port));
        assert_eq!(engine.running(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_admin_port_is_server_not_found() {
        let engine = PluginEngine::new();

        assert_eq!(engine.verify(1).await, Err(EngineError::ServerNotFound { port: 1 }));
        assert_eq!(
            engine.add_interactions(1, &[]).await,
            Err(EngineError::ServerNotFound { port: 1 })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tls_is_not_supported() {
        let engine = PluginEngine::new();
        let request = MockServerRequest { tls: true, ..request(free_port("127.0.0.1").unwrap()) };

        assert_eq!(engine.start_mock_server(&request).await, Err(EngineError::TlsConfiguration));
        assert_eq!(engine.running(), 0);
        assert!(engine.tls_certificate_authority().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn occupied_admin_port_fails_to_start() {
        let engine = PluginEngine::new();
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let admin_port = blocker.local_addr().unwrap().port();

        let err = engine.start_mock_server(&request(admin_port)).await.unwrap_err();

        assert!(matches!(err, EngineError::UnableToStart { .. }));
        assert!(!engine.is_running(admin_port));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cleanup_releases_admin_port() {
        let engine = PluginEngine::new();
        let admin_port = free_port("127.0.0.1").unwrap();
        engine.start_mock_server(&request(admin_port)).await.unwrap();

        assert!(engine.cleanup_mock_server(admin_port));

        let mut rebound = false;
        for _ in 0..50 {
            if tokio::net::TcpListener::bind(("127.0.0.1", admin_port)).await.is_ok() {
                rebound = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(rebound, "admin port should be free after cleanup");
    }
}
