mod args;
mod factory;
mod loader;
mod paper;

use anyhow::Context;
use args::Args;
use clap::Parser;
use log::{error, info, warn};
use pricing::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uploader_core::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("=== Settlement Price Uploader Starting ===");

    let settings = loader::load_settings(&args.config)?;
    let polling_interval = args
        .polling_interval_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.polling_interval());

    let cancel = CancellationToken::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut orchestrator = Orchestrator::new(
        settings.uploader.clone(),
        factory::build_sources(&settings, clock.clone())?,
        factory::build_destinations(&settings)?,
        factory::build_sink(&settings.notifications),
        clock,
        cancel.clone(),
    )
    .context("Failed to start the uploader")?;

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal_cancel.cancel();
            }
            Err(e) => warn!("Unable to listen for shutdown signal: {}", e),
        }
    });

    let outcome = if args.once {
        orchestrator.run_cycle().await
    } else {
        info!("Polling every {:?}", polling_interval);
        orchestrator.run(polling_interval).await
    };
    let shutdown = orchestrator.shutdown().await;

    if let Err(e) = outcome.and(shutdown) {
        if e.is_cancelled() {
            info!("Uploader stopped");
            return Ok(());
        }
        error!("Uploader stopped on error: {}", e);
        std::process::exit(1);
    }
    info!("Uploader stopped");
    Ok(())
}
