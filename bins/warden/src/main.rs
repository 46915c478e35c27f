use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::io::IsTerminal;
use std::time::Duration;
use tracing::{error, info};

use warden_supervisor::config::WardenConfig;
use warden_supervisor::Supervisor;

/// Warden - supervise external processes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Run duration in seconds (for testing)
    #[arg(long)]
    run_duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = WardenConfig::load_from_file(&args.config)?;

    if args.check {
        println!(
            "Configuration OK: {} processes ({} enabled)",
            config.processes.len(),
            config.enabled_processes().len()
        );
        return Ok(());
    }

    let level = if args.debug {
        "debug"
    } else {
        config.supervisor.log_level.as_str()
    };
    initialize_logging(level);

    info!("Starting warden");
    info!("Config file: {}", args.config);

    let shutdown = shutdown_signal()?;

    let supervisor = Supervisor::new();
    for process in config.enabled_processes() {
        let spec = process
            .to_spec()
            .with_context(|| format!("Invalid process configuration: {}", process.name))?;

        if let Err(e) = supervisor.create(spec) {
            error!(process = %process.name, error = %e, "Failed to start process");
        }
    }

    info!("Supervising {} processes", supervisor.len());

    match args.run_duration {
        Some(secs) => {
            info!("Running for {} seconds (test mode)", secs);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = shutdown => {}
            }
        }
        None => shutdown.await,
    }

    info!("Shutting down...");
    supervisor
        .shutdown_all(config.supervisor.shutdown_timeout)
        .await;
    info!("Warden stopped");

    Ok(())
}

fn initialize_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(false)
        .init();
}

/// Registers the shutdown listeners up front, so a signal that arrives
/// while processes are still launching is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    })
}

#[cfg(windows)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    })
}
