//! avroom - AV room controller
//!
//! Runs the room on the simulated device layer with an operator console.

use anyhow::{Context, Result};
use avroom::cli::{self, ReplCommand};
use avroom::devices::{DeviceEvent, SimulatedDevices, SimulatedSwitch};
use avroom::{Room, RoomConfig};
use clap::Parser;
use colored::*;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// AV room controller - source routing and panel power management
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "room.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Simulate a controller without a built-in RF gateway
    #[arg(long)]
    no_internal_gateway: bool,

    /// Run without the operator console (stop with Ctrl+C)
    #[arg(long)]
    no_repl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting avroom v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = if Path::new(&args.config).exists() {
        RoomConfig::load(&args.config).await?
    } else {
        warn!("⚠️  {} not found, using the stock room", args.config);
        RoomConfig::default()
    };
    info!("Configuration loaded successfully");

    let devices = Arc::new(SimulatedDevices::new(!args.no_internal_gateway));
    let switch = Arc::new(SimulatedSwitch::new(format!(
        "matrix switch 0x{:02X} @ {}",
        config.switcher.ip_id, config.switcher.ip
    )));

    let room = Room::initialize(config, devices.clone(), switch).await;

    let (repl_tx, repl_rx) = mpsc::unbounded_channel();
    if !args.no_repl {
        std::thread::Builder::new()
            .name("repl".into())
            .spawn(move || {
                if let Err(e) = cli::run_repl(repl_tx) {
                    error!("REPL stopped: {}", e);
                }
            })
            .context("Failed to start the operator console")?;
    }

    run_app(&room, &devices, repl_rx, shutdown_signal()).await?;

    room.shutdown().await;
    info!("avroom shutdown complete");
    Ok(())
}

async fn run_app(
    room: &Room,
    devices: &SimulatedDevices,
    mut commands: mpsc::UnboundedReceiver<ReplCommand>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    info!("Starting main application loop...");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            Some(cmd) = commands.recv() => match cmd {
                ReplCommand::Device(event) => {
                    if let DeviceEvent::OnlineStatusChanged { panel, online } = &event {
                        devices.set_online(*panel, *online);
                    }
                    room.handle_event(event).await;
                }
                ReplCommand::Select(name) => match room.select_source(&name).await {
                    Ok(()) => println!("{} {}", "✅ selected".green(), name),
                    Err(e) => println!("{} {}", "error:".red().bold(), e),
                },
                ReplCommand::Sleep(panel) => {
                    if !room.sleep(panel) {
                        println!("{} no lifecycle for panel {}", "error:".red().bold(), panel);
                    }
                }
                ReplCommand::Status => {
                    let status = room.status().await;
                    println!("{}", serde_json::to_string_pretty(&status)?);
                }
                ReplCommand::Help => cli::print_help(),
                ReplCommand::Quit => break,
            },
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}
