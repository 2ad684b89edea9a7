//! wvw-tracker entry point.
//!
//! Polls the configured world until interrupted, or runs a single cycle
//! when `TRACKER_RUN_ONCE` is set.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use wvw_tracker::config::{LogFormat, TrackerConfig};
use wvw_tracker::engine::TrackerEngine;
use wvw_tracker::scheduler::PollScheduler;
use wvw_tracker::source::Gw2Client;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TrackerConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::info!(world_id = config.world_id, "starting wvw-tracker");

    let source = Arc::new(Gw2Client::new(&config)?);
    let engine = Arc::new(TrackerEngine::open(config, source).await?);
    tracing::info!(
        data_dir = %engine.store().data_dir().display(),
        lock = engine.store().lock_kind(),
        retention_days = engine.config().retention_days,
        "engine ready"
    );

    if engine.config().run_once {
        let report = engine.run_cycle(engine.config().world_id).await?;
        tracing::info!(
            match_id = %report.match_id,
            guilds = report.guilds_observed,
            failed = report.failed_steps.len(),
            "single cycle finished"
        );
        return Ok(());
    }

    let scheduler = PollScheduler::from_config(Arc::clone(&engine));
    tokio::select! {
        () = scheduler.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutdown requested");
        }
    }
    Ok(())
}
