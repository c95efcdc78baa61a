//! xfwd-server: X11 forwarding server.
//!
//! Allocates a forwarded X display with its own authority file and relays
//! every connection to it over a session channel. Run standalone it uses a
//! direct TCP session to a local display, which is handy for checking X
//! clients against the forwarding path.

mod config;
mod transport;
mod x11;

use anyhow::Context;
use clap::Parser;
use config::ServerConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use transport::DirectSession;
use x11::{DisplayAllocator, X11Forwarder};
use xfwd_core::X11Request;

/// xfwd-server — X11 forwarding server
#[derive(Parser, Debug)]
#[command(name = "xfwd-server", version, about = "X11 forwarding server")]
struct Cli {
    /// Config file path
    #[arg(long, default_value = "~/.xfwd/config.toml")]
    config: String,

    /// Display to forward connections to (host:port)
    #[arg(long)]
    target: Option<String>,

    /// First display number to try
    #[arg(long)]
    display_offset: Option<u16>,

    /// Raw x11-req payload (hex); overrides the auth and screen flags
    #[arg(long)]
    request: Option<String>,

    /// X11 authentication protocol
    #[arg(long, default_value = "MIT-MAGIC-COOKIE-1")]
    auth_protocol: String,

    /// Authentication cookie (hex). A random 16-byte cookie is used if omitted.
    #[arg(long)]
    auth_data: Option<String>,

    /// Screen number
    #[arg(long, default_value_t = 0)]
    screen: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn x11_request(&self) -> anyhow::Result<X11Request> {
        if let Some(raw) = &self.request {
            let payload = hex::decode(raw).context("--request is not valid hex")?;
            return Ok(X11Request::parse(&payload)?);
        }

        let auth_data = self
            .auth_data
            .clone()
            .unwrap_or_else(|| hex::encode(rand::random::<[u8; 16]>()));
        Ok(X11Request {
            single_connection: false,
            auth_protocol: self.auth_protocol.clone(),
            auth_data,
            screen_number: self.screen,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting xfwd-server");

    let config_path = PathBuf::from(&cli.config);
    let server_config = ServerConfig::load(
        Some(&config_path),
        cli.target.as_deref(),
        cli.display_offset,
    )
    .context("failed to load config")?;

    let request = cli.x11_request()?;
    let binding = DisplayAllocator::new(server_config.x11.clone())
        .allocate(&request)
        .await
        .context("failed to allocate x11 display")?;

    info!(display = binding.display_number(), port = binding.port(), "x11 display ready");
    println!("DISPLAY={}", binding.display_env(&request));
    println!("XAUTHORITY={}", binding.authority_path().display());

    let session = Arc::new(DirectSession::new(server_config.target.clone()));
    let forwarder = X11Forwarder::start(binding, session);
    info!(
        display = forwarder.display_number(),
        dest = %server_config.target,
        "forwarding x11 connections"
    );

    shutdown_signal().await?;
    info!("received shutdown signal");

    forwarder.close().await;
    forwarder.wait().await?;

    info!("xfwd-server stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = ctrl_c => result?,
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    Ok(())
}
