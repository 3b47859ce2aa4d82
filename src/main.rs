//! Entry point for the PTY session MCP server.
//!
//! Initializes tracing (to stderr, so it doesn't interfere with the MCP
//! stdio transport), validates CLI-supplied configuration, creates the
//! registry and server, and serves on stdin/stdout.

use std::process::ExitCode;

use agentsh_pty::registry::Registry;
use agentsh_pty::server::PtyMcpServer;
use anyhow::Result;
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use tracing_subscriber::{self, EnvFilter};

/// An MCP server exposing long-lived PTY sessions to agents via
/// sentinel-based command completion.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Maximum number of concurrently open sessions.
    #[arg(long, default_value_t = 10)]
    max_sessions: usize,

    /// Directory to write per-session transcript logs under. Must already
    /// exist; omit to disable session logging.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    if let Some(dir) = &cli.log_dir {
        if !std::path::Path::new(dir).is_dir() {
            tracing::error!("configuration error: log-dir '{dir}' does not exist");
            return ExitCode::FAILURE;
        }
    }

    tracing::info!(
        "starting agentsh-pty v{} (max_sessions={})",
        env!("CARGO_PKG_VERSION"),
        cli.max_sessions
    );

    let registry = Registry::new(cli.max_sessions, cli.log_dir.clone());
    let server = PtyMcpServer::new(registry.clone());

    let result = run(server).await;
    registry.shutdown().await;

    match result {
        Ok(()) => {
            tracing::info!("agentsh-pty server shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("agentsh-pty server error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(server: PtyMcpServer) -> Result<()> {
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("serving error: {e:?}");
    })?;
    service.waiting().await?;
    Ok(())
}
