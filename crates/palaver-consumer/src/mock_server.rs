//! Mock server endpoint handed to consumer tests.

use std::io;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

/// Where the consumer under test should connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerConfig {
    /// Host the mock server listens on
    pub host: String,
    /// Port the mock server listens on
    pub port: u16,
    /// CA certificate (PEM) when the engine serves TLS
    pub tls_certificate: Option<Vec<u8>>,
}

impl MockServerConfig {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Send one message and read the reply.
    ///
    /// Opens a fresh connection, writes `message`, half-closes the write side
    /// and reads until the server closes. An unmatched message yields an
    /// empty reply.
    pub async fn send(&self, message: &str) -> io::Result<String> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.write_all(message.as_bytes()).await?;
        stream.shutdown().await?;

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
}
