//! Periodic poll loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::engine::TrackerEngine;

/// Runs [`TrackerEngine::run_cycle`] for one world forever, sleeping
/// `interval` after every cycle whatever its outcome.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    engine: Arc<TrackerEngine>,
    world_id: u32,
    interval: Duration,
}

impl PollScheduler {
    /// Creates a scheduler for an explicit world and interval.
    #[must_use]
    pub fn new(engine: Arc<TrackerEngine>, world_id: u32, interval: Duration) -> Self {
        Self {
            engine,
            world_id,
            interval,
        }
    }

    /// Creates a scheduler for the configured world and interval.
    #[must_use]
    pub fn from_config(engine: Arc<TrackerEngine>) -> Self {
        let world_id = engine.config().world_id;
        let interval = engine.config().poll_interval;
        Self::new(engine, world_id, interval)
    }

    /// Runs one cycle and logs its outcome. Returns `true` if the fetch
    /// succeeded.
    pub async fn tick(&self) -> bool {
        match self.engine.run_cycle(self.world_id).await {
            Ok(report) if report.is_complete() => {
                tracing::info!(
                    world_id = self.world_id,
                    match_id = %report.match_id,
                    guilds = report.guilds_observed,
                    "poll cycle complete"
                );
                true
            }
            Ok(report) => {
                let failed: Vec<String> =
                    report.failed_steps.iter().map(ToString::to_string).collect();
                tracing::warn!(
                    world_id = self.world_id,
                    match_id = %report.match_id,
                    failed = ?failed,
                    "poll cycle partially applied"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    world_id = self.world_id,
                    error = %e,
                    code = e.error_code(),
                    transient = e.is_transient(),
                    "poll cycle skipped"
                );
                false
            }
        }
    }

    /// Loops until the task is dropped or aborted.
    pub async fn run(self) {
        tracing::info!(
            world_id = self.world_id,
            interval_secs = self.interval.as_secs(),
            "poll scheduler started"
        );
        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Runs the loop on a background task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::future::BoxFuture;

    use super::*;
    use crate::config::TrackerConfig;
    use crate::domain::MatchSnapshot;
    use crate::error::TrackerError;
    use crate::persistence::LockBackend;
    use crate::source::MatchSource;

    #[derive(Debug, Default)]
    struct Failing {
        calls: AtomicUsize,
    }

    impl MatchSource for Failing {
        fn fetch_current_match(
            &self,
            _world_id: u32,
        ) -> BoxFuture<'_, Result<MatchSnapshot, TrackerError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Err::<MatchSnapshot, _>(TrackerError::Fetch("upstream down".to_string()))
            })
        }
    }

    #[tokio::test]
    async fn loop_survives_failed_fetches() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let config = TrackerConfig {
            data_dir: dir.path().to_path_buf(),
            lock_backend: LockBackend::Process,
            ..TrackerConfig::default()
        };
        let source = Arc::new(Failing::default());
        let Ok(engine) =
            TrackerEngine::open(config, Arc::clone(&source) as Arc<dyn MatchSource>).await
        else {
            panic!("engine open failed");
        };

        let scheduler = PollScheduler::new(Arc::new(engine), 1020, Duration::from_millis(10));
        let handle = scheduler.spawn();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        assert!(source.calls.load(Ordering::SeqCst) >= 3);
    }
}
