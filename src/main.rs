//! Mocktail Stub Server - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use mocktail_stub_server::{HttpStubServer, StubServer, StubServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mocktail-stub-server",
    about = "HTTP stub server - serves Mocktail stub files with regex paths and stateful stubs",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "stub-server.yaml")]
    config: PathBuf,

    /// Address to listen on (overrides the configuration file)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Additional stub file to enable (repeatable, enabled after configured stubs)
    #[arg(short, long = "stub", value_name = "FILE")]
    stubs: Vec<PathBuf>,

    /// Body delay for stubs without a stub-delay header, in milliseconds
    #[arg(long, value_name = "MS")]
    default_delay_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and stub files, then exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../demos/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        StubServerConfig::from_file(&args.config)?
    } else if args.validate && args.stubs.is_empty() {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration");
        StubServerConfig::default()
    };

    if let Some(listen) = args.listen {
        config.settings.listen = listen;
    }
    if let Some(delay_ms) = args.default_delay_ms {
        config.settings.default_delay_ms = delay_ms;
    }
    config.stubs.extend(args.stubs);
    config.validate()?;

    // Loading every stub also validates it
    let server = HttpStubServer::from_config(&config).await?;

    if args.validate {
        println!(
            "Configuration is valid ({} stubs loaded)",
            server.registry().len()
        );
        return Ok(());
    }

    server.start(config.settings.listen).await?;

    shutdown_signal().await;
    info!("Shutdown signal received");
    server.stop().await;

    let stats = server.registry().stats();
    info!(
        total = stats.requests_total,
        matched = stats.requests_matched,
        unmatched = stats.requests_unmatched,
        "Request summary"
    );

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
