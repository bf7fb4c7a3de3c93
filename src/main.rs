//! # Pad Bridge
//!
//! Use a phone as a mouse and gamepad for a Linux desktop.
//!
//! This application receives the phone controller app's UDP packets and
//! injects them as local input through uinput, ydotool or xdotool.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use pad_bridge::backend::{create_backend, BackendKind};
use pad_bridge::config::Config;
use pad_bridge::dispatch::Dispatcher;
use pad_bridge::logging;
use pad_bridge::registry::ClientRegistry;
use pad_bridge::server::UdpServer;
use pad_bridge::stats::ServerStats;

/// Phone controller to desktop input bridge
#[derive(Parser, Debug, Default)]
#[clap(author, version, about)]
struct Args {
    /// TOML configuration file
    #[clap(long)]
    config: Option<PathBuf>,

    /// UDP port to listen on
    #[clap(short, long)]
    port: Option<u16>,

    /// Input backend
    #[clap(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Verbose logging (debug level)
    #[clap(short, long)]
    debug: bool,

    /// Accept gamepad packets without verifying the checksum
    #[clap(long)]
    no_checksum: bool,

    /// Also move the pointer with the left stick
    #[clap(long)]
    joystick_as_mouse: bool,
}

/// Apply command-line overrides on top of the file configuration
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(kind) = args.backend {
        config.backend.kind = kind;
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }
    if args.no_checksum {
        config.input.verify_checksum = false;
    }
    if args.joystick_as_mouse {
        config.input.joystick_as_mouse = true;
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    apply_overrides(&mut config, args);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Resolve on SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = interrupt => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}

/// Main entry point for Pad Bridge
///
/// # Control Flow
///
/// 1. Parse arguments, load and validate configuration
/// 2. Set up logging (console + append-only file)
/// 3. Start the first available input backend
/// 4. Receive packets until SIGINT or SIGTERM, then close the backend, log
///    statistics and exit
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded or is invalid
/// - No input backend can be started
/// - The UDP socket cannot be bound or fails while receiving
///
/// # Examples
///
/// ```bash
/// cargo run --release -- --port 26760 --backend uinput
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = logging::init(&config.logging)?;

    info!("Pad Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = config.logging.file_path() {
        info!("Logging to {}", path.display());
    }

    let backend = create_backend(&config.backend)?;
    info!("Input backend: {} ({})", backend.name(), backend.method());

    let dispatcher = Dispatcher::new(
        backend,
        Arc::new(ClientRegistry::new()),
        Arc::new(ServerStats::new()),
        &config.input,
    );

    let server = UdpServer::bind(&config, dispatcher).await?;
    info!(
        "Mouse sensitivity {}, scroll sensitivity {}, stick deadzone {}, trigger deadzone {}",
        config.input.mouse_sensitivity,
        config.input.scroll_sensitivity,
        config.input.joystick_deadzone,
        config.input.trigger_deadzone
    );
    info!(
        "Checksum verification {}, gyro encoding {:?}, joystick as mouse {}",
        if config.input.verify_checksum { "on" } else { "off" },
        config.input.gyro_encoding,
        config.input.joystick_as_mouse
    );
    info!("Press Ctrl+C (SIGINT) or send SIGTERM to exit");

    let stats = server.run(shutdown_signal()).await?;

    info!("Processed {} packets, shutting down", stats.packets);
    Ok(())
}
