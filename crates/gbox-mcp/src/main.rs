//! # Gbox MCP Server
//!
//! Model Context Protocol server that lets AI agents drive remote Android,
//! Linux and browser boxes.
//!
//! ## Overview
//!
//! Two transports are available:
//! - stdio: one session for the process lifetime, for the selected platform
//! - Streamable HTTP: `/mcp/{platform}` with one isolated session per client
//!
//! ## Architecture
//!
//! This is Layer 1 - the server binary that ties together:
//! - gbox-mcp-core: Core types, configuration and logging
//! - gbox-mcp-session: Session lifecycle

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gbox_mcp::{build_managers, build_router};
use gbox_mcp_core::{Platform, ServerConfig, TransportMode};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "gbox-mcp", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serve Android boxes over stdio
    #[arg(long, group = "platform")]
    android: bool,

    /// Serve Linux boxes over stdio
    #[arg(long, group = "platform")]
    linux: bool,

    /// Serve browser boxes over stdio
    #[arg(long, group = "platform")]
    browser: bool,

    /// Transport mode
    #[arg(long, value_name = "stdio|http")]
    mode: Option<TransportMode>,

    /// HTTP listening port
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn platform(&self) -> Option<Platform> {
        if self.android {
            Some(Platform::Android)
        } else if self.linux {
            Some(Platform::Linux)
        } else if self.browser {
            Some(Platform::Browser)
        } else {
            None
        }
    }

    /// File, then environment, then command line.
    fn load_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        config.apply_env()?;

        if let Some(platform) = self.platform() {
            config.server.platform = platform;
        }
        if let Some(mode) = self.mode {
            config.server.mode = mode;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Initialize logging; stdout belongs to the stdio transport
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    tracing::info!(
        "Gbox MCP Server v{} starting in {:?} mode",
        config.server.version,
        config.server.mode
    );

    match config.server.mode {
        TransportMode::Stdio => gbox_mcp::transport::stdio::run(&config).await?,
        TransportMode::Http => serve_http(&config).await?,
    }

    tracing::info!("Gbox MCP Server shutting down");

    Ok(())
}

async fn serve_http(config: &ServerConfig) -> anyhow::Result<()> {
    let managers = build_managers(config);
    let handles: Vec<_> = managers.values().cloned().collect();
    let app = build_router(managers);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let platforms: Vec<&str> = config.server.platforms.iter().map(Platform::name).collect();
    tracing::info!(
        "Listening on {} for platforms [{}]",
        addr,
        platforms.join(", ")
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    for manager in &handles {
        manager.destroy();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
