//! Admin server lifecycle.

use std::{net::SocketAddr, sync::Arc};

use tokio::{net::TcpListener, task::JoinHandle};

use crate::{
    PluginServerConfig,
    admin::{self, AdminState},
    error::ServerError,
    listener,
    registry::SessionRegistry,
};

/// Bound admin control plane, not yet serving.
pub struct AdminServer {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    session_host: Arc<str>,
}

impl AdminServer {
    /// Bind the admin plane.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The bind address is empty
    /// - Binding to the address fails
    pub async fn bind(config: PluginServerConfig) -> Result<Self, ServerError> {
        if config.bind_address.is_empty() {
            return Err(ServerError::Config("bind address must not be empty".to_string()));
        }

        let listener = TcpListener::bind(config.bind_address.as_str()).await?;

        Ok(Self {
            listener,
            registry: Arc::new(SessionRegistry::new()),
            session_host: Arc::from(config.session_host),
        })
    }

    /// Get the local address the admin plane is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Registry shared by the admin plane and the session listeners.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Serve admin requests until the server fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let local_addr = self.local_addr()?;
        tracing::info!("Admin plane starting on {}", local_addr);

        let (queue, worker) = listener::spawn_session_worker(Arc::clone(&self.registry));
        let app = admin::router(AdminState {
            registry: Arc::clone(&self.registry),
            queue,
            session_host: self.session_host,
            admin_port: local_addr.port(),
        });

        let result = axum::serve(self.listener, app).await;

        worker.abort();
        self.registry.teardown_all().await;

        result.map_err(ServerError::from)
    }

    /// Serve admin requests on a background task.
    ///
    /// Must be called from within a Tokio runtime. Dropping the returned
    /// handle stops the admin plane and every session listener.
    pub fn spawn(self) -> Result<AdminHandle, ServerError> {
        let local_addr = self.local_addr()?;

        let (queue, worker) = listener::spawn_session_worker(Arc::clone(&self.registry));
        let app = admin::router(AdminState {
            registry: Arc::clone(&self.registry),
            queue,
            session_host: self.session_host,
            admin_port: local_addr.port(),
        });

        let listener = self.listener;
        let serve = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Admin plane stopped: {}", e);
            }
        });

        tracing::info!("Admin plane listening on {}", local_addr);

        Ok(AdminHandle { local_addr, registry: self.registry, serve, worker })
    }
}

/// Running admin plane.
///
/// Owns the serving task and the session worker; both are aborted when the
/// handle is dropped, which closes the admin socket and every session
/// listener.
#[derive(Debug)]
pub struct AdminHandle {
    local_addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    serve: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl AdminHandle {
    /// Address the admin plane is served on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Registry behind this admin plane.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Tear down all sessions, then stop serving.
    pub async fn shutdown(self) {
        self.registry.teardown_all().await;
        drop(self);
    }
}

impl Drop for AdminHandle {
    fn drop(&mut self) {
        self.serve.abort();
        self.worker.abort();
        tracing::debug!("Admin plane on {} stopped", self.local_addr);
    }
}
