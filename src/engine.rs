//! Tracker engine: shared context and the per-cycle pipeline.

use std::fmt;
use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::domain::{MatchId, MatchSnapshot};
use crate::error::TrackerError;
use crate::persistence::DocumentStore;
use crate::service::{GuildDiscovery, MatchLifecycle, QueryService, TimeSeriesRecorder};
use crate::source::MatchSource;

/// A persistence step of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleStep {
    /// Matchup resolution and rotation.
    Resolve,
    /// Guild discovery.
    Observe,
    /// K/D series append.
    RecordKdr,
    /// Activity series append.
    RecordActivity,
}

impl fmt::Display for CycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolve => "resolve",
            Self::Observe => "observe",
            Self::RecordKdr => "record_kdr",
            Self::RecordActivity => "record_activity",
        })
    }
}

/// Outcome of a cycle whose fetch succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// World the cycle was run for.
    pub world_id: u32,
    /// Matchup the snapshot belonged to.
    pub match_id: MatchId,
    /// `(team, guild)` pairs counted by discovery; zero if it failed.
    pub guilds_observed: usize,
    /// Steps that failed; the others were committed.
    pub failed_steps: Vec<CycleStep>,
}

impl CycleReport {
    /// Returns `true` if every step committed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

/// Everything a cycle needs: configuration, store, upstream source and
/// the services built on top of the store.
///
/// Share it behind an [`Arc`]; concurrent [`TrackerEngine::run_cycle`]
/// calls are safe because every write is a store transaction.
#[derive(Debug)]
pub struct TrackerEngine {
    config: TrackerConfig,
    store: DocumentStore,
    source: Arc<dyn MatchSource>,
    lifecycle: MatchLifecycle,
    discovery: GuildDiscovery,
    recorder: TimeSeriesRecorder,
    query: QueryService,
}

impl TrackerEngine {
    /// Opens the document store from `config` and wires the services.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidConfig`] for an out-of-range
    /// configuration, or a [`TrackerError`] if the store cannot be opened.
    pub async fn open(
        config: TrackerConfig,
        source: Arc<dyn MatchSource>,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        let store = DocumentStore::open(&config.data_dir, config.lock_backend).await?;
        Ok(Self::new(config, store, source))
    }

    /// Wires the services over an already opened store.
    #[must_use]
    pub fn new(config: TrackerConfig, store: DocumentStore, source: Arc<dyn MatchSource>) -> Self {
        let retention = config.retention();
        Self {
            lifecycle: MatchLifecycle::new(store.clone(), retention, config.end_grace()),
            discovery: GuildDiscovery::new(store.clone()),
            recorder: TimeSeriesRecorder::new(store.clone(), retention),
            query: QueryService::new(store.clone()),
            config,
            store,
            source,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Underlying document store.
    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Match lifecycle manager.
    #[must_use]
    pub fn lifecycle(&self) -> &MatchLifecycle {
        &self.lifecycle
    }

    /// Guild discovery engine.
    #[must_use]
    pub fn discovery(&self) -> &GuildDiscovery {
        &self.discovery
    }

    /// Time-series recorder.
    #[must_use]
    pub fn recorder(&self) -> &TimeSeriesRecorder {
        &self.recorder
    }

    /// Read-side query surface.
    #[must_use]
    pub fn query(&self) -> &QueryService {
        &self.query
    }

    /// Fetches the current snapshot for `world_id`, bounded by the
    /// configured fetch timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::FetchTimeout`] when the bound is hit, or
    /// the source's error otherwise.
    pub async fn fetch(&self, world_id: u32) -> Result<MatchSnapshot, TrackerError> {
        let timeout = self.config.fetch_timeout;
        tokio::time::timeout(timeout, self.source.fetch_current_match(world_id))
            .await
            .map_err(|_| TrackerError::FetchTimeout {
                timeout_secs: timeout.as_secs(),
            })?
    }

    /// Runs one full cycle for `world_id`: fetch, then resolve, observe,
    /// record K/D and record activity.
    ///
    /// Nothing is written when the fetch fails. After a successful fetch
    /// each step is its own transaction and a failing step does not stop
    /// the others; failures are listed in the report.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackerError`] only if the fetch fails or times out.
    pub async fn run_cycle(&self, world_id: u32) -> Result<CycleReport, TrackerError> {
        let snapshot = self.fetch(world_id).await?;
        Ok(self.apply_snapshot(world_id, &snapshot).await)
    }

    /// Applies an already fetched snapshot; the persistence half of
    /// [`TrackerEngine::run_cycle`].
    pub async fn apply_snapshot(&self, world_id: u32, snapshot: &MatchSnapshot) -> CycleReport {
        let match_id = snapshot.id.clone();
        let mut failed_steps = Vec::new();

        if let Err(e) = self.lifecycle.resolve(snapshot).await {
            tracing::error!(
                world_id,
                match_id = %match_id,
                error = %e,
                step = %CycleStep::Resolve,
                "cycle step failed"
            );
            failed_steps.push(CycleStep::Resolve);
        }

        let guilds_observed = match self.discovery.observe(&match_id, snapshot).await {
            Ok(summary) => summary.observed,
            Err(e) => {
                tracing::error!(
                    world_id,
                    match_id = %match_id,
                    error = %e,
                    step = %CycleStep::Observe,
                    "cycle step failed"
                );
                failed_steps.push(CycleStep::Observe);
                0
            }
        };

        if let Err(e) = self.recorder.record_kdr(&match_id, snapshot).await {
            tracing::error!(
                world_id,
                match_id = %match_id,
                error = %e,
                step = %CycleStep::RecordKdr,
                "cycle step failed"
            );
            failed_steps.push(CycleStep::RecordKdr);
        }

        if let Err(e) = self.recorder.record_activity(&match_id, snapshot).await {
            tracing::error!(
                world_id,
                match_id = %match_id,
                error = %e,
                step = %CycleStep::RecordActivity,
                "cycle step failed"
            );
            failed_steps.push(CycleStep::RecordActivity);
        }

        CycleReport {
            world_id,
            match_id,
            guilds_observed,
            failed_steps,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use futures_util::future::BoxFuture;

    use super::*;
    use crate::persistence::LockBackend;

    #[derive(Debug)]
    struct Stalled;

    impl MatchSource for Stalled {
        fn fetch_current_match(
            &self,
            _world_id: u32,
        ) -> BoxFuture<'_, Result<MatchSnapshot, TrackerError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err::<MatchSnapshot, _>(TrackerError::Fetch("unreachable".to_string()))
            })
        }
    }

    #[tokio::test]
    async fn fetch_timeout_writes_nothing() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let config = TrackerConfig {
            data_dir: dir.path().to_path_buf(),
            fetch_timeout: Duration::from_millis(50),
            lock_backend: LockBackend::Process,
            ..TrackerConfig::default()
        };
        let Ok(engine) = TrackerEngine::open(config, Arc::new(Stalled)).await else {
            panic!("engine open failed");
        };

        let result = engine.run_cycle(1020).await;
        assert!(matches!(result, Err(TrackerError::FetchTimeout { .. })));
        let Ok(entries) = std::fs::read_dir(dir.path()) else {
            panic!("read_dir");
        };
        let documents = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .count();
        assert_eq!(documents, 0);
    }

    #[tokio::test]
    async fn open_rejects_out_of_range_retention() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let config = TrackerConfig {
            data_dir: dir.path().join("data"),
            retention_days: u32::MAX,
            lock_backend: LockBackend::Process,
            ..TrackerConfig::default()
        };
        let result = TrackerEngine::open(config, Arc::new(Stalled)).await;
        assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn step_names_are_snake_case() {
        assert_eq!(CycleStep::RecordKdr.to_string(), "record_kdr");
        assert!(
            CycleReport {
                world_id: 1,
                match_id: MatchId::from("1-2"),
                guilds_observed: 0,
                failed_steps: Vec::new(),
            }
            .is_complete()
        );
    }
}
