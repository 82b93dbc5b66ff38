//! Palaver plugin server binary.
//!
//! # Usage
//!
//! ```bash
//! # Admin plane on the default port, sessions on loopback
//! palaver-server
//!
//! # Admin plane on all interfaces
//! palaver-server --bind 0.0.0.0:4444 --session-host 0.0.0.0
//! ```

use clap::Parser;
use palaver_server::{AdminServer, PluginServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Palaver plugin mock server
#[derive(Parser, Debug)]
#[command(name = "palaver-server")]
#[command(about = "Session-oriented plugin mock server for contract tests")]
#[command(version)]
struct Args {
    /// Address the admin plane binds to
    #[arg(short, long, default_value = "127.0.0.1:4444")]
    bind: String,

    /// Host that session transport listeners bind on
    #[arg(long, default_value = "127.0.0.1")]
    session_host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Palaver plugin server starting");
    tracing::info!("Binding admin plane to {}", args.bind);

    let config = PluginServerConfig { bind_address: args.bind, session_host: args.session_host };

    let server = AdminServer::bind(config).await?;

    tracing::info!("Admin plane listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
