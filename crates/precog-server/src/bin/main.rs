//! Precog playground server
//!
//! # Usage
//!
//! ```bash
//! precog-playground --addr 0.0.0.0:3000 --log-json
//! ```

use clap::Parser;
use precog_server::{playground, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "precog-playground")]
#[command(about = "Playground server for precognitive form validation")]
#[command(version)]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1:3000", env = "PRECOG_ADDR")]
    addr: String,

    /// Largest request body to buffer, in bytes
    #[arg(long, default_value_t = precog_server::DEFAULT_BODY_LIMIT, env = "PRECOG_BODY_LIMIT")]
    body_limit: usize,

    /// Emit logs as JSON
    #[arg(long, env = "PRECOG_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::default()
        .with_addr(cli.addr)
        .with_body_limit(cli.body_limit)
        .with_log_json(cli.log_json);

    init_tracing(config.log_json);

    let addr = config.socket_addr()?;
    let router = playground::router(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), %addr, "Starting precog playground");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
