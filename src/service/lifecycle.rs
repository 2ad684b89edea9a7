//! Match lifecycle: which record a snapshot belongs to, rotation, pruning.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{MatchId, MatchRecord, MatchSnapshot, window_start};
use crate::error::TrackerError;
use crate::persistence::{DocumentStore, GuildRegistry};

/// Outcome of resolving one snapshot against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The record the snapshot belongs to.
    pub match_id: MatchId,
    /// Whether the record was created by this call.
    pub created: bool,
    /// Records superseded by this matchup.
    pub retired: Vec<MatchId>,
    /// Stale records removed past retention.
    pub pruned: Vec<MatchId>,
}

/// Creates, refreshes, retires and prunes [`MatchRecord`]s.
#[derive(Debug, Clone)]
pub struct MatchLifecycle {
    store: DocumentStore,
    retention: Duration,
    end_grace: Duration,
}

impl MatchLifecycle {
    /// Creates a lifecycle manager over `store`.
    #[must_use]
    pub fn new(store: DocumentStore, retention: Duration, end_grace: Duration) -> Self {
        Self {
            store,
            retention,
            end_grace,
        }
    }

    /// Resolves `snapshot` to its record, creating it on first sight.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackerError`] if the registry cannot be locked or
    /// committed.
    pub async fn resolve(&self, snapshot: &MatchSnapshot) -> Result<Resolution, TrackerError> {
        self.resolve_with(snapshot, Utc::now).await
    }

    /// [`MatchLifecycle::resolve`] with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// See [`MatchLifecycle::resolve`].
    pub async fn resolve_at(
        &self,
        snapshot: &MatchSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Resolution, TrackerError> {
        self.resolve_with(snapshot, move || now).await
    }

    async fn resolve_with(
        &self,
        snapshot: &MatchSnapshot,
        clock: impl FnOnce() -> DateTime<Utc>,
    ) -> Result<Resolution, TrackerError> {
        let (retention, grace) = (self.retention, self.end_grace);
        let resolution = self
            .store
            .modify(|registry: &mut GuildRegistry| {
                apply_resolution(registry, snapshot, clock(), retention, grace)
            })
            .await?;

        if resolution.created {
            tracing::info!(match_id = %resolution.match_id, "new matchup recorded");
        }
        for old in &resolution.retired {
            tracing::info!(
                match_id = %old,
                superseded_by = %resolution.match_id,
                "matchup rotated out"
            );
        }
        if !resolution.pruned.is_empty() {
            tracing::info!(pruned = resolution.pruned.len(), "stale matchups pruned");
        }
        Ok(resolution)
    }

    /// Returns `true` if `match_id` is the latest matchup for its worlds
    /// and its validity window has not ended. Unknown ids are not current.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackerError`] if the registry cannot be read.
    pub async fn is_current(&self, match_id: &MatchId) -> Result<bool, TrackerError> {
        let registry = self.store.read::<GuildRegistry>().await?;
        Ok(is_current_in(&registry, match_id, Utc::now()))
    }

    /// The current matchup `world_id` takes part in, if any is tracked.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackerError`] if the registry cannot be read.
    pub async fn current_match_id(&self, world_id: u32) -> Result<Option<MatchId>, TrackerError> {
        let registry = self.store.read::<GuildRegistry>().await?;
        Ok(current_for_world(&registry, world_id, Utc::now()))
    }
}

/// Applies one snapshot to the registry.
///
/// Creates or refreshes the snapshot's record and retires every other live
/// record sharing a world with it (a world plays in one matchup at a time).
/// A snapshot older than a matchup already tracked for one of its worlds
/// (an earlier `start_time`) is recorded but retires nothing and stays
/// retired itself, so a slow cycle cannot supersede the live matchup.
/// Stale records whose last update is older than `retention` are pruned.
pub fn apply_resolution(
    registry: &mut GuildRegistry,
    snapshot: &MatchSnapshot,
    now: DateTime<Utc>,
    retention: Duration,
    end_grace: Duration,
) -> Resolution {
    let match_id = snapshot.id.clone();
    let worlds = snapshot.world_ids();
    let superseded = registry.matches.values().any(|record| {
        record.match_id != match_id
            && record.shares_world_with(&worlds)
            && record.start_time > snapshot.start_time
    });

    let created = !registry.matches.contains_key(&match_id);
    let record = registry
        .matches
        .entry(match_id.clone())
        .or_insert_with(|| MatchRecord::new(match_id.clone(), snapshot, now));
    if !created {
        record.refresh(snapshot, now);
    }
    record.retired_at = if superseded {
        record.retired_at.or(Some(now))
    } else {
        None
    };

    let mut retired = Vec::new();
    if !superseded {
        for (id, record) in &mut registry.matches {
            if *id != match_id
                && record.retired_at.is_none()
                && record.shares_world_with(&worlds)
                && record.start_time <= snapshot.start_time
            {
                record.retired_at = Some(now);
                retired.push(id.clone());
            }
        }
    }

    let cutoff = window_start(now, retention);
    let mut pruned = Vec::new();
    registry.matches.retain(|id, record| {
        let prune =
            *id != match_id && record.is_stale(now, end_grace) && record.last_updated < cutoff;
        if prune {
            pruned.push(id.clone());
        }
        !prune
    });

    Resolution {
        match_id,
        created,
        retired,
        pruned,
    }
}

/// Pure form of [`MatchLifecycle::is_current`].
#[must_use]
pub fn is_current_in(registry: &GuildRegistry, match_id: &MatchId, now: DateTime<Utc>) -> bool {
    registry
        .get(match_id)
        .is_some_and(|record| record.is_current(now))
}

/// Pure form of [`MatchLifecycle::current_match_id`].
#[must_use]
pub fn current_for_world(
    registry: &GuildRegistry,
    world_id: u32,
    now: DateTime<Utc>,
) -> Option<MatchId> {
    registry
        .matches
        .values()
        .filter(|record| record.world_ids.contains(&world_id) && record.is_current(now))
        .max_by_key(|record| record.last_updated)
        .map(|record| record.match_id.clone())
}
