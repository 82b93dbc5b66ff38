//! HTTP client for the plugin server admin plane.

use std::net::SocketAddr;

use palaver_proto::{
    CreateSessionResponse, ErrorBody, Interaction, LoadInteractionsRequest,
    LoadInteractionsResponse, MismatchDetail, Mismatches,
};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::engine::EngineError;

/// Admin plane client bound to one server.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: reqwest::Client,
    base_url: String,
}

impl AdminClient {
    /// Client for the admin plane at `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self { http: reqwest::Client::new(), base_url: format!("http://{addr}") }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /sessions`
    pub async fn create_session(&self) -> Result<CreateSessionResponse, EngineError> {
        let response = self
            .http
            .post(format!("{}/sessions", self.base_url))
            .send()
            .await
            .map_err(request_failed)?;
        decode(response, None).await
    }

    /// `POST /sessions/{id}/interactions`
    pub async fn load_interactions(
        &self,
        session_id: &str,
        interactions: &[Interaction],
    ) -> Result<usize, EngineError> {
        let body = LoadInteractionsRequest { interactions: interactions.to_vec() };
        let response = self
            .http
            .post(format!("{}/sessions/{session_id}/interactions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;
        let loaded: LoadInteractionsResponse = decode(response, Some(session_id)).await?;
        Ok(loaded.loaded)
    }

    /// `GET /sessions/{id}/mismatches`
    pub async fn mismatches(&self, session_id: &str) -> Result<Vec<MismatchDetail>, EngineError> {
        let response = self
            .http
            .get(format!("{}/sessions/{session_id}/mismatches", self.base_url))
            .send()
            .await
            .map_err(request_failed)?;
        let report: Mismatches = decode(response, Some(session_id)).await?;
        Ok(report.mismatches)
    }

    /// `DELETE /sessions/{id}`
    pub async fn delete_session(&self, session_id: &str) -> Result<(), EngineError> {
        let response = self
            .http
            .delete(format!("{}/sessions/{session_id}", self.base_url))
            .send()
            .await
            .map_err(request_failed)?;
        check_status(response, Some(session_id)).await.map(|_| ())
    }
}

fn request_failed(err: reqwest::Error) -> EngineError {
    EngineError::Admin { reason: err.to_string() }
}

async fn decode<T: DeserializeOwned>(
    response: Response,
    session_id: Option<&str>,
) -> Result<T, EngineError> {
    check_status(response, session_id).await?.json().await.map_err(request_failed)
}

async fn check_status(response: Response, session_id: Option<&str>) -> Result<Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => String::new(),
    };

    match (status, session_id) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(EngineError::SessionNotFound { id: id.to_string() }),
        _ => Err(EngineError::Admin { reason: format!("{status}: {error}") }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use palaver_server::{AdminHandle, AdminServer, PluginServerConfig};

    use super::*;

    async fn spawn_admin() -> AdminHandle {
        let server = AdminServer::bind(PluginServerConfig::on("127.0.0.1", 0)).await.unwrap();
        server.spawn().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn session_round_trip() {
        let admin = spawn_admin().await;
        let client = AdminClient::new(admin.local_addr());
        assert_eq!(client.base_url(), format!("http://{}", admin.local_addr()));

        let session = client.create_session().await.unwrap();
        assert_eq!(session.admin_port, admin.local_addr().port());

        let loaded = client
            .load_interactions(&session.id, &[Interaction::new("PING", "PONG")])
            .await
            .unwrap();
        assert_eq!(loaded, 1);

        let mismatches = client.mismatches(&session.id).await.unwrap();
        assert_eq!(mismatches, vec![MismatchDetail::missing("PING")]);

        client.delete_session(&session.id).await.unwrap();
        assert_eq!(
            client.mismatches(&session.id).await,
            Err(EngineError::SessionNotFound { id: session.id.clone() })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_interaction_surfaces_admin_error() {
        let admin = spawn_admin().await;
        let client = AdminClient::new(admin.local_addr());
        let session = client.create_session().await.unwrap();

        let err = client.load_interactions(&session.id, &[Interaction::new("", "x")]).await.unwrap_err();

        match err {
            EngineError::Admin { reason } => assert!(reason.starts_with("400")),
            other => panic!("expected admin error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_admin_plane_is_admin_error() {
        let port = crate::free_port("127.0.0.1").unwrap();
        let client = AdminClient::new(SocketAddr::from(([127, 0, 0, 1], port)));

        assert!(matches!(client.create_session().await, Err(EngineError::Admin { .. })));
    }
}
