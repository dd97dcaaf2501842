//! Speckit Memory MCP Server
//!
//! Serves the spec-aware memory engine to an AI coding agent over the Model
//! Context Protocol (stdio JSON-RPC). The tool surface is layered L1-L7:
//! orchestration, core search/save, discovery, mutation, checkpoints,
//! analysis, and maintenance.

mod protocol;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use speckit_core::{validate_api_key, EngineConfig, MemoryEngine};

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

#[derive(Debug, Parser)]
#[command(
    name = "speckit-mcp",
    version,
    about = "Spec-aware memory engine over the Model Context Protocol"
)]
struct Args {
    /// Custom database file (defaults to the platform data directory)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Skip the background archival job
    #[arg(long)]
    no_archival_job: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logging goes to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("speckit-mcp v{} starting", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::from_env();

    // Credential pre-flight: invalid keys surface before the first embed.
    // Local providers and SPECKIT_SKIP_API_VALIDATION pass without network.
    let validation = validate_api_key(&config).await;
    if !validation.valid {
        warn!(
            provider = %validation.provider,
            error = validation.error.as_deref().unwrap_or("unknown"),
            code = validation.error_code.unwrap_or(""),
            "credential validation failed; the chain will fall back"
        );
    } else if let Some(warning) = &validation.warning {
        warn!(provider = %validation.provider, "{}", warning);
    } else {
        info!(provider = %validation.provider, "credentials validated");
    }

    let engine = match MemoryEngine::new(config, args.db) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("failed to initialize the memory engine: {}", e);
            std::process::exit(1);
        }
    };

    // Probe the provider chain and rebuild the vector index; degrades to
    // lexical-only rather than failing.
    engine.initialize().await;

    // Background archival scan plus the idle-session sweep on the same timer
    if !args.no_archival_job {
        let start = engine.archival().start_background_job();
        if start.started {
            info!(interval_ms = start.interval_ms, "archival job started");
        }

        let sweep_engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let period = std::time::Duration::from_millis(
                sweep_engine.config().archival_scan_interval_ms,
            );
            loop {
                tokio::time::sleep(period).await;
                match sweep_engine.working_memory().cleanup_old_sessions() {
                    Ok(0) => {}
                    Ok(n) => info!(reaped = n, "idle sessions swept"),
                    Err(e) => warn!("session sweep failed: {}", e),
                }
            }
        });
    }

    let server = McpServer::new(Arc::clone(&engine));
    let transport = StdioTransport::new();

    info!("serving MCP on stdio");
    if let Err(e) = transport.run(server).await {
        error!("server error: {}", e);
        std::process::exit(1);
    }

    engine.archival().stop_background_job();
    info!("speckit-mcp shutting down");
}
