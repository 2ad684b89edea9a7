//! Time-series recording with rolling retention.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{
    ActivitySnapshot, History, KdrSnapshot, MatchId, MatchSnapshot, Timestamped,
    window_start,
};
use crate::error::TrackerError;
use crate::persistence::{Document, DocumentStore};

/// Result of appending one entry to a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSummary {
    /// Timestamp the entry was stored under.
    pub timestamp: DateTime<Utc>,
    /// Entries dropped by retention in the same write.
    pub pruned: usize,
}

/// Appends per-cycle K/D and activity entries and enforces retention.
#[derive(Debug, Clone)]
pub struct TimeSeriesRecorder {
    store: DocumentStore,
    retention: Duration,
}

impl TimeSeriesRecorder {
    /// Creates a recorder keeping `retention` worth of history.
    #[must_use]
    pub fn new(store: DocumentStore, retention: Duration) -> Self {
        Self { store, retention }
    }

    /// Appends a K/D entry for `match_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackerError`] if the history cannot be locked or
    /// committed.
    pub async fn record_kdr(
        &self,
        match_id: &MatchId,
        snapshot: &MatchSnapshot,
    ) -> Result<RecordSummary, TrackerError> {
        self.append::<KdrSnapshot>(match_id, Utc::now, |ts| {
            KdrSnapshot::from_snapshot(snapshot, ts)
        })
        .await
    }

    /// [`TimeSeriesRecorder::record_kdr`] with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// See [`TimeSeriesRecorder::record_kdr`].
    pub async fn record_kdr_at(
        &self,
        match_id: &MatchId,
        snapshot: &MatchSnapshot,
        now: DateTime<Utc>,
    ) -> Result<RecordSummary, TrackerError> {
        self.append::<KdrSnapshot>(match_id, move || now, |ts| {
            KdrSnapshot::from_snapshot(snapshot, ts)
        })
        .await
    }

    /// Appends an objective-ownership entry for `match_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackerError`] if the history cannot be locked or
    /// committed.
    pub async fn record_activity(
        &self,
        match_id: &MatchId,
        snapshot: &MatchSnapshot,
    ) -> Result<RecordSummary, TrackerError> {
        self.append::<ActivitySnapshot>(match_id, Utc::now, |ts| {
            ActivitySnapshot::from_snapshot(snapshot, ts)
        })
        .await
    }

    /// [`TimeSeriesRecorder::record_activity`] with an explicit clock
    /// reading.
    ///
    /// # Errors
    ///
    /// See [`TimeSeriesRecorder::record_activity`].
    pub async fn record_activity_at(
        &self,
        match_id: &MatchId,
        snapshot: &MatchSnapshot,
        now: DateTime<Utc>,
    ) -> Result<RecordSummary, TrackerError> {
        self.append::<ActivitySnapshot>(match_id, move || now, |ts| {
            ActivitySnapshot::from_snapshot(snapshot, ts)
        })
        .await
    }

    async fn append<S>(
        &self,
        match_id: &MatchId,
        clock: impl FnOnce() -> DateTime<Utc>,
        build: impl FnOnce(DateTime<Utc>) -> S,
    ) -> Result<RecordSummary, TrackerError>
    where
        S: Timestamped + Clone,
        History<S>: Document,
    {
        let retention = self.retention;
        let summary = self
            .store
            .modify(|history: &mut History<S>| {
                let now = clock();
                let timestamp = history.append_with(match_id, now, build);
                let pruned = history.prune_before(window_start(now, retention));
                RecordSummary { timestamp, pruned }
            })
            .await?;

        tracing::debug!(
            document = <History<S> as Document>::NAME,
            match_id = %match_id,
            timestamp = %summary.timestamp,
            pruned = summary.pruned,
            "time-series entry recorded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ActivityHistory, KdrHistory, PerTeam, TeamWorlds};
    use crate::persistence::LockBackend;

    fn ts(hour: i64) -> DateTime<Utc> {
        let Some(t) = DateTime::from_timestamp(1_790_000_000 + hour * 3600, 0) else {
            panic!("valid timestamp");
        };
        t
    }

    fn snapshot(id: &str) -> MatchSnapshot {
        MatchSnapshot {
            id: MatchId::from(id),
            start_time: ts(0),
            end_time: ts(168),
            worlds: PerTeam::<TeamWorlds>::default(),
            kills: PerTeam {
                red: 5,
                green: 120,
                blue: 10,
            },
            deaths: PerTeam {
                red: 5,
                green: 40,
                blue: 0,
            },
            maps: Vec::new(),
        }
    }

    async fn recorder() -> (tempfile::TempDir, DocumentStore, TimeSeriesRecorder) {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let Ok(store) = DocumentStore::open(dir.path(), LockBackend::Process).await else {
            panic!("store open failed");
        };
        let recorder = TimeSeriesRecorder::new(store.clone(), Duration::days(7));
        (dir, store, recorder)
    }

    #[tokio::test]
    async fn kdr_entry_is_persisted() {
        let (_dir, store, recorder) = recorder().await;
        let snap = snapshot("1-2");
        let Ok(summary) = recorder.record_kdr_at(&snap.id, &snap, ts(1)).await else {
            panic!("record failed");
        };
        assert_eq!(summary.timestamp, ts(1));

        let Ok(history) = store.read::<KdrHistory>().await else {
            panic!("read failed");
        };
        let Some(latest) = history.latest(&snap.id) else {
            panic!("no entry");
        };
        assert!((latest.teams.green.kdr - 3.0).abs() < f64::EPSILON);
        assert!((latest.teams.blue.kdr - 10.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn retention_applies_to_every_matchup() {
        let (_dir, store, recorder) = recorder().await;
        let old = snapshot("1-1");
        let live = snapshot("1-2");
        let Ok(_) = recorder.record_activity_at(&old.id, &old, ts(0)).await else {
            panic!("record failed");
        };
        let Ok(summary) = recorder.record_activity_at(&live.id, &live, ts(7 * 24 + 1)).await else {
            panic!("record failed");
        };
        assert_eq!(summary.pruned, 1);

        let Ok(activity) = store.read::<ActivityHistory>().await else {
            panic!("read failed");
        };
        let Ok(kdr) = store.read::<KdrHistory>().await else {
            panic!("read failed");
        };
        assert!(!activity.series.contains_key(&old.id));
        assert_eq!(activity.since(&live.id, ts(0)).len(), 1);
        assert!(kdr.series.is_empty());
    }

    #[tokio::test]
    async fn series_timestamps_never_decrease() {
        let (_dir, store, recorder) = recorder().await;
        let snap = snapshot("1-2");
        for hour in [5, 3, 6] {
            let Ok(_) = recorder.record_kdr_at(&snap.id, &snap, ts(hour)).await else {
                panic!("record failed");
            };
        }
        let Ok(history) = store.read::<KdrHistory>().await else {
            panic!("read failed");
        };
        let stamps: Vec<_> = history.since(&snap.id, ts(0)).iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![ts(5), ts(5), ts(6)]);
    }
}
