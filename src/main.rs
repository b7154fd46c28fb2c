//! YXC GW - Rust implementation
//!
//! Gateway exposing a Yamaha YXC receiver as volume and source controls.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yxc_gw::bridge::{LoopTiming, ReconciliationLoop};
use yxc_gw::config::GatewayConfig;
use yxc_gw::drivers::YxcDriver;
use yxc_gw::hub::ConsoleHub;
use yxc_gw::paths::AppPaths;
use yxc_gw::settings::{SettingsService, SettingsStore};

/// YXC Gateway - Control a Yamaha network receiver from the console hub
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the detected app directory)
    #[arg(short, long, env = "YXC_GW_CONFIG")]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut paths = AppPaths::detect();
    if let Some(config) = &args.config {
        paths = paths.with_config(config);
    }
    paths.ensure_directories()?;

    let _log_guard = init_logging(&args.log_level, &paths.logs_dir)?;

    info!("Starting YXC GW...");
    info!("Data directory: {}", paths.base_dir().display());
    info!("Configuration file: {}", paths.config.display());

    let config = GatewayConfig::load_or_default(&paths.config).await?;

    let store = SettingsStore::open(paths.sled_db_path())?;
    let settings = store.load_or_default().shared();
    info!("⚙️ Settings loaded");

    let hub = Arc::new(ConsoleHub::new());
    let factory = YxcDriver::factory(&config.receiver).context("Failed to create HTTP client")?;

    let handle = ReconciliationLoop::spawn(
        hub.clone(),
        hub.clone(),
        factory,
        settings.clone(),
        LoopTiming::from(&config.timing),
    );
    info!("🔁 Reconciliation loop started");

    let service = SettingsService::new(store, settings).with_loop(handle.clone());

    tokio::select! {
        result = yxc_gw::cli::run_repl(handle.clone(), service, hub.clone()) => {
            if let Err(e) = result {
                warn!("Console stopped: {:#}", e);
            }
        }
        _ = shutdown_signal() => {}
    }

    handle.shutdown().await;
    info!("YXC GW shutdown complete");
    Ok(())
}

fn init_logging(level: &str, logs_dir: &Path) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::daily(logs_dir, "yxc-gw.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
