//! Transport listeners.
//!
//! Session creation and listener startup are decoupled by an unbounded work
//! queue: the admin plane binds the socket, enqueues it and replies, while a
//! single worker task spawns one accept loop per session. Each accepted
//! connection is handled on its own task.
//!
//! Wire protocol: the client writes one message, the server reads once (up to
//! [`MAX_MESSAGE_SIZE`] bytes), trims it, writes back the matched response
//! (empty if unmatched) and closes the connection.
//!
//! There is no read timeout and no connection limit; this is test-scope
//! traffic.

use std::{sync::Arc, time::Duration};

use bytes::BytesMut;
use palaver_proto::MAX_MESSAGE_SIZE;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};

use crate::{error::ServerError, registry::SessionRegistry, session::SessionId};

/// Pause after a failed accept (e.g. fd exhaustion) before retrying.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A bound session socket waiting for its accept loop.
#[derive(Debug)]
pub(crate) struct PendingListener {
    pub(crate) id: SessionId,
    pub(crate) listener: TcpListener,
}

/// Sending half of the session work queue.
pub(crate) type SessionQueue = mpsc::UnboundedSender<PendingListener>;

/// Start the session worker.
///
/// Aborting the returned task stops every listener it started, and with them
/// every in-flight connection.
pub(crate) fn spawn_session_worker(registry: Arc<SessionRegistry>) -> (SessionQueue, JoinHandle<()>) {
    let (queue, pending) = mpsc::unbounded_channel();
    let worker = tokio::spawn(run_session_worker(pending, registry));
    (queue, worker)
}

async fn run_session_worker(
    mut pending: mpsc::UnboundedReceiver<PendingListener>,
    registry: Arc<SessionRegistry>,
) {
    tracing::debug!("session worker started");
    let mut listeners = JoinSet::new();

    loop {
        tokio::select! {
            next = pending.recv() => match next {
                Some(PendingListener { id, listener }) => {
                    let handle =
                        listeners.spawn(run_listener(id.clone(), listener, Arc::clone(&registry)));

                    if let Err(e) = registry.attach_listener(&id, handle).await {
                        tracing::debug!(session_id = %id, "listener not attached: {}", e);
                    }
                },
                None => break,
            },
            Some(joined) = listeners.join_next(), if !listeners.is_empty() => {
                if let Err(e) = joined {
                    if !e.is_cancelled() {
                        tracing::error!("listener task failed: {}", e);
                    }
                }
            },
        }
    }

    tracing::debug!("session worker stopped");
}

/// Accept loop for one session. Runs until aborted by session teardown.
async fn run_listener(id: SessionId, listener: TcpListener, registry: Arc<SessionRegistry>) {
    match listener.local_addr() {
        Ok(addr) => tracing::debug!(session_id = %id, "listening on {}", addr),
        Err(e) => tracing::warn!(session_id = %id, "listener has no local address: {}", e),
    }

    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(session_id = %id, "accepted connection from {}", peer);
                    let id = id.clone();
                    let registry = Arc::clone(&registry);

                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, &id, &registry).await {
                            tracing::debug!(session_id = %id, "connection error: {}", e);
                        }
                    });
                },
                Err(e) => accept_failed(&id, &e).await,
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {},
        }
    }
}

async fn accept_failed(id: &SessionId, error: &std::io::Error) {
    tracing::warn!(session_id = %id, "accept error: {}", error);
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Serve a single message on `stream`.
///
/// Read failures and EOF produce an empty reply rather than an error so the
/// client never blocks waiting for a response.
async fn handle_connection(
    mut stream: TcpStream,
    id: &SessionId,
    registry: &SessionRegistry,
) -> Result<(), ServerError> {
    let mut buf = BytesMut::zeroed(MAX_MESSAGE_SIZE);

    let response = match stream.read(&mut buf[..]).await {
        Ok(len) => {
            buf.truncate(len);
            let message = String::from_utf8_lossy(&buf);

            match registry.match_message(id, &message).await {
                Ok(outcome) => outcome.into_response(),
                Err(e) => {
                    tracing::debug!(session_id = %id, "match skipped: {}", e);
                    String::new()
                },
            }
        },
        Err(e) => {
            tracing::debug!(session_id = %id, "read error: {}", e);
            String::new()
        },
    };

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use palaver_proto::Interaction;

    use super::*;

    async fn exchange(addr: std::net::SocketAddr, message: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(message).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test(start_paused = true)]
    async fn accept_error_backs_off() {
        let start = tokio::time::Instant::now();
        let error = std::io::Error::other("too many open files");

        accept_failed(&SessionId::generate(), &error).await;

        assert!(start.elapsed() >= ACCEPT_BACKOFF);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queued_listener_serves_matches() {
        let registry = Arc::new(SessionRegistry::new());
        let (queue, worker) = spawn_session_worker(Arc::clone(&registry));

        let created = registry.create_session("127.0.0.1").await.unwrap();
        registry.load_interactions(&created.id, vec![Interaction::new("PING", "PONG")]).await.unwrap();
        let addr = created.listen_address;
        queue.send(PendingListener { id: created.id.clone(), listener: created.listener }).unwrap();

        assert_eq!(exchange(addr, b"PING\n").await, "PONG");
        assert_eq!(exchange(addr, b"NOPE").await, "");
        assert_eq!(registry.get(&created.id).await.unwrap().matched(), ["PING"]);

        worker.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_write_gets_empty_reply() {
        let registry = Arc::new(SessionRegistry::new());
        let (queue, worker) = spawn_session_worker(Arc::clone(&registry));

        let created = registry.create_session("127.0.0.1").await.unwrap();
        let addr = created.listen_address;
        queue.send(PendingListener { id: created.id, listener: created.listener }).unwrap();

        assert_eq!(exchange(addr, b"").await, "");

        worker.abort();
    }
}
