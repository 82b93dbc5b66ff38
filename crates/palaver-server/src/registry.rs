//! Session Registry
//!
//! Process-wide owner of plugin transport sessions.
//!
//! ## Responsibilities
//!
//! - Session Lifecycle: Create sessions with a freshly bound transport socket,
//!   tear them down and stop their listeners
//! - Interaction Loading: Replace a session's expected-interaction table
//! - Matching: Serialize inbound matches against concurrent admin requests
//! - Mismatch Reporting: Derive never-matched expectations
//!
//! ## Design
//!
//! - One lock per session: admin requests and transport connections touch the
//!   same session from independent tasks, but different sessions never
//!   contend beyond the brief map lookup
//! - Ports come from the OS at creation time and stay bound by the session's
//!   listener, so they cannot be handed out twice while the session lives
//! - Injected, not global: the admin plane and the listener layer share one
//!   `Arc<SessionRegistry>`

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use palaver_proto::{Interaction, InteractionError, MismatchDetail};
use tokio::{
    net::TcpListener,
    sync::{Mutex, RwLock},
    task::AbortHandle,
};

use crate::{
    matcher::{self, MatchOutcome},
    mismatch,
    session::{Session, SessionId},
};

/// Errors from registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Session does not exist
    #[error("session not found: {id}")]
    SessionNotFound {
        /// Requested identifier
        id: SessionId,
    },

    /// Interaction table rejected at the boundary
    #[error("invalid interaction: {0}")]
    InvalidInteraction(#[from] InteractionError),

    /// Could not bind the session's transport socket
    #[error("failed to bind session listener: {0}")]
    Bind(#[source] std::io::Error),
}

/// A session that was just created, with its bound but not yet serving
/// transport socket.
#[derive(Debug)]
pub struct NewSession {
    /// Identifier of the new session
    pub id: SessionId,
    /// Address the listener is bound to
    pub listen_address: SocketAddr,
    /// Bound socket, to be handed to the listener task
    pub listener: TcpListener,
}

/// Registry entry: session state plus the handle of its listener task.
#[derive(Debug)]
struct SessionSlot {
    session: Session,
    listener: Option<AbortHandle>,
}

impl SessionSlot {
    fn stop_listener(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }
}

/// Concurrency-safe table of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<SessionSlot>>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Whether `id` names a live session.
    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Create a session whose transport socket is bound on `host` at an
    /// OS-assigned port.
    ///
    /// The returned listener is not yet accepting; hand it to the session
    /// worker. Identifiers are regenerated on the (astronomically unlikely)
    /// collision with a live session.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Bind` if no socket can be bound.
    pub async fn create_session(&self, host: &str) -> Result<NewSession, RegistryError> {
        let listener = TcpListener::bind((host, 0)).await.map_err(RegistryError::Bind)?;
        let listen_address = listener.local_addr().map_err(RegistryError::Bind)?;

        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = SessionId::generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let slot = SessionSlot { session: Session::new(id.clone(), listen_address), listener: None };
        sessions.insert(id.clone(), Arc::new(Mutex::new(slot)));
        drop(sessions);

        tracing::info!(session_id = %id, port = listen_address.port(), "session created");

        Ok(NewSession { id, listen_address, listener })
    }

    /// Snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::SessionNotFound` if the session doesn't exist.
    pub async fn get(&self, id: &SessionId) -> Result<Session, RegistryError> {
        let slot = self.slot(id).await?;
        let slot = slot.lock().await;
        Ok(slot.session.clone())
    }

    /// Replace the expected-interaction table of a session.
    ///
    /// Returns the number of distinct message keys now expected.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::SessionNotFound` if the session doesn't exist.
    /// Returns `RegistryError::InvalidInteraction` if any interaction fails
    /// validation; the table is left unchanged.
    pub async fn load_interactions(
        &self,
        id: &SessionId,
        interactions: Vec<Interaction>,
    ) -> Result<usize, RegistryError> {
        let slot = self.slot(id).await?;
        let mut slot = slot.lock().await;
        let loaded = slot.session.load_interactions(interactions)?;

        tracing::debug!(session_id = %id, loaded, "loaded interactions");
        Ok(loaded)
    }

    /// Record that `message` was received, if it is an expected key.
    ///
    /// Returns whether anything was recorded.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::SessionNotFound` if the session doesn't exist.
    pub async fn record_match(&self, id: &SessionId, message: &str) -> Result<bool, RegistryError> {
        let slot = self.slot(id).await?;
        let mut slot = slot.lock().await;
        Ok(slot.session.record_match(message))
    }

    /// Match a raw inbound message against the session's table.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::SessionNotFound` if the session doesn't exist.
    pub async fn match_message(
        &self,
        id: &SessionId,
        raw: &str,
    ) -> Result<MatchOutcome, RegistryError> {
        let slot = self.slot(id).await?;
        let mut slot = slot.lock().await;
        Ok(matcher::match_message(&mut slot.session, raw))
    }

    /// Expected interactions of the session that were never matched.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::SessionNotFound` if the session doesn't exist.
    pub async fn mismatches(&self, id: &SessionId) -> Result<Vec<MismatchDetail>, RegistryError> {
        let slot = self.slot(id).await?;
        let slot = slot.lock().await;
        Ok(mismatch::unmatched_interactions(&slot.session))
    }

    /// Associate the running listener task with its session.
    ///
    /// If the session was torn down in the meantime the listener is stopped
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::SessionNotFound` if the session doesn't exist.
    pub async fn attach_listener(
        &self,
        id: &SessionId,
        handle: AbortHandle,
    ) -> Result<(), RegistryError> {
        let slot = match self.slot(id).await {
            Ok(slot) => slot,
            Err(e) => {
                handle.abort();
                return Err(e);
            },
        };

        let mut slot = slot.lock().await;
        slot.stop_listener();
        slot.listener = Some(handle);
        Ok(())
    }

    /// Tear down a session and stop its listener.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::SessionNotFound` if the session doesn't exist.
    pub async fn remove(&self, id: &SessionId) -> Result<(), RegistryError> {
        let slot = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| RegistryError::SessionNotFound { id: id.clone() })?;

        slot.lock().await.stop_listener();
        tracing::info!(session_id = %id, "session removed");
        Ok(())
    }

    /// Tear down every session.
    pub async fn teardown_all(&self) {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();

        for (id, slot) in drained {
            slot.lock().await.stop_listener();
            tracing::debug!(session_id = %id, "session torn down");
        }
    }

    async fn slot(&self, id: &SessionId) -> Result<Arc<Mutex<SessionSlot>>, RegistryError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::SessionNotFound { id: id.clone() })
    }
}
