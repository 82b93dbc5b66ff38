//! Admin control plane.
//!
//! Thin HTTP translation layer over the [`SessionRegistry`]: routes requests,
//! maps unknown session ids to `404` and malformed or invalid bodies to `400`,
//! both with an [`ErrorBody`]. No business logic lives here.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use palaver_proto::{
    CreateSessionResponse, ErrorBody, LoadInteractionsRequest, LoadInteractionsResponse,
    Mismatches,
};

use crate::{
    listener::{PendingListener, SessionQueue},
    registry::{NewSession, RegistryError, SessionRegistry},
    session::SessionId,
};

/// Errors surfaced to admin clients.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Unknown session id
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// Body did not parse or failed validation
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Server-side failure (socket allocation, worker gone)
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for AdminError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::SessionNotFound { id } => Self::NotFound(id),
            RegistryError::InvalidInteraction(e) => Self::BadRequest(e.to_string()),
            RegistryError::Bind(e) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub(crate) struct AdminState {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) queue: SessionQueue,
    /// Host the session transport sockets bind on
    pub(crate) session_host: Arc<str>,
    /// Port this admin plane is served on, echoed to clients
    pub(crate) admin_port: u16,
}

/// Build the admin router.
pub(crate) fn router(state: AdminState) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", delete(delete_session))
        .route("/sessions/{id}/interactions", post(load_interactions))
        .route("/sessions/{id}/mismatches", get(mismatches))
        .with_state(state)
}

/// `POST /sessions`
async fn create_session(
    State(state): State<AdminState>,
) -> Result<Json<CreateSessionResponse>, AdminError> {
    let NewSession { id, listen_address, listener } =
        state.registry.create_session(&state.session_host).await?;

    let response = CreateSessionResponse {
        id: id.to_string(),
        port: listen_address.port(),
        admin_port: state.admin_port,
    };

    if state.queue.send(PendingListener { id: id.clone(), listener }).is_err() {
        let _ = state.registry.remove(&id).await;
        return Err(AdminError::Internal("session worker is not running".to_string()));
    }

    Ok(Json(response))
}

/// `POST /sessions/{id}/interactions`
async fn load_interactions(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    body: Result<Json<LoadInteractionsRequest>, JsonRejection>,
) -> Result<Json<LoadInteractionsResponse>, AdminError> {
    let id = SessionId::from(id);
    if !state.registry.contains(&id).await {
        return Err(AdminError::NotFound(id));
    }

    let Json(request) = body.map_err(|rejection| {
        tracing::warn!(session_id = %id, "malformed interactions body: {}", rejection.body_text());
        AdminError::BadRequest(rejection.body_text())
    })?;

    let loaded = state.registry.load_interactions(&id, request.interactions).await?;
    Ok(Json(LoadInteractionsResponse { loaded }))
}

/// `GET /sessions/{id}/mismatches`
async fn mismatches(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<Mismatches>, AdminError> {
    let id = SessionId::from(id);
    let mismatches = state.registry.mismatches(&id).await?;

    tracing::debug!(session_id = %id, count = mismatches.len(), "reporting mismatches");
    Ok(Json(Mismatches { mismatches }))
}

/// `DELETE /sessions/{id}`
async fn delete_session(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AdminError> {
    state.registry.remove(&SessionId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
