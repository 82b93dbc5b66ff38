//! Mock server readiness poll.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::ConsumerError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Poll `host:port` until it accepts a TCP connection.
///
/// # Errors
///
/// Returns `ReadinessTimeout` naming the port and bound if nothing accepts
/// within `timeout`.
pub async fn wait_for_port(host: &str, port: u16, timeout: Duration) -> Result<(), ConsumerError> {
    let poll = async {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match TcpStream::connect((host, port)).await {
                Ok(_) => return attempts,
                Err(e) => tracing::trace!(host, port, attempts, "not ready: {}", e),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(attempts) => {
            tracing::debug!(host, port, attempts, "mock server ready");
            Ok(())
        },
        Err(_) => Err(ConsumerError::ReadinessTimeout { host: host.to_string(), port, timeout }),
    }
}
