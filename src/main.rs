//! Application entry point for env-trigger.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from the path given as the first argument, or from
//!    the platform config directory (defaults on first run).
//! 3. Validate the configuration.
//! 4. Create the [`tokio`] runtime.
//! 5. Start the pipeline with the in-memory store and a stdout sink.
//! 6. Pump `<topic> <payload>` lines from stdin into the pipeline.
//! 7. On Ctrl-C, shut down within the grace period.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use env_trigger::{
    config::AppConfig,
    pipeline::Orchestrator,
    store::MemoryStore,
    transport::{pump_lines, StdoutSink},
};
use tokio::io::BufReader;

fn load_config() -> Result<AppConfig> {
    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => AppConfig::load_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        })),
    }
}

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("env-trigger starting up");

    // 2–3. Configuration
    let config = load_config()?;
    config.validate().context("invalid configuration")?;

    // 4. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async move {
        // 5. Pipeline
        let running = Orchestrator::new(
            config.clone(),
            Arc::new(MemoryStore::with_retention(config.trigger.retention())),
            Arc::new(StdoutSink::stdout()),
        )
        .start();

        // 6. stdin → inbound queue (keeps running after EOF; the poller
        //    still fires for devices already seen)
        tokio::spawn(pump_lines(
            BufReader::new(tokio::io::stdin()),
            running.inbound(),
            config.queues.scalar_send_timeout(),
            running.cancel_token(),
        ));

        // 7. Wait for Ctrl-C, then shut down
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
        }
        log::info!("Ctrl-C received");

        let aborted = running.shutdown().await;
        if aborted > 0 {
            log::warn!("{aborted} task(s) were aborted during shutdown");
        }
    });

    // The stdin reader sits on a blocking thread that never returns on its own.
    rt.shutdown_timeout(Duration::from_millis(100));
    Ok(())
}
