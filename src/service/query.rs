//! Read-only query surface over the persisted documents.
//!
//! Every query loads the latest committed state under a shared lock. A
//! read failure is logged and answered with an empty result, so consumers
//! never see a partially written document.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::lifecycle::{current_for_world, is_current_in};
use crate::domain::{
    ActivityHistory, ActivitySnapshot, GuildEntry, KdrHistory, KdrSnapshot, MatchId, MatchRecord,
    Team, window_start,
};
use crate::persistence::{Document, DocumentStore, GuildRegistry};

/// One line of [`QueryService::active_matches`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchStatus {
    /// Matchup id.
    pub match_id: MatchId,
    /// Whether the matchup is still current.
    pub is_current: bool,
    /// End of the validity window.
    pub end_time: DateTime<Utc>,
    /// When the record was last touched.
    pub last_updated: DateTime<Utc>,
    /// Guild entries across all teams.
    pub guild_count: usize,
}

/// Read-side access for dashboards and other consumers.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: DocumentStore,
}

impl QueryService {
    /// Creates a query service over `store`.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    async fn load<D: Document>(&self) -> D {
        match self.store.read::<D>().await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(document = D::NAME, error = %e, "read failed; answering empty");
                D::default()
            }
        }
    }

    /// Guilds of `team` in `match_id`, ordered by name (case-insensitive).
    pub async fn get_guilds_by_team(&self, match_id: &MatchId, team: Team) -> Vec<GuildEntry> {
        let registry = self.load::<GuildRegistry>().await;
        let mut guilds: Vec<GuildEntry> = registry
            .get(match_id)
            .map(|record| record.teams.get(team).guilds.values().cloned().collect())
            .unwrap_or_default();
        guilds.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        guilds
    }

    /// Guilds of every team in `match_id`, most claims first.
    ///
    /// A guild fighting for two teams appears once per team.
    pub async fn get_all_guilds_sorted(&self, match_id: &MatchId) -> Vec<(Team, GuildEntry)> {
        let registry = self.load::<GuildRegistry>().await;
        let Some(record) = registry.get(match_id) else {
            return Vec::new();
        };
        let mut guilds: Vec<(Team, GuildEntry)> = record
            .teams
            .iter()
            .flat_map(|(team, t)| t.guilds.values().map(move |g| (team, g.clone())))
            .collect();
        guilds.sort_by(|(_, a), (_, b)| {
            b.claims_count
                .cmp(&a.claims_count)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.id.cmp(&b.id))
        });
        guilds
    }

    /// K/D entries of `match_id` recorded within the last `window`.
    pub async fn get_kdr_timeline(&self, match_id: &MatchId, window: Duration) -> Vec<KdrSnapshot> {
        self.get_kdr_timeline_at(match_id, window, Utc::now()).await
    }

    /// [`QueryService::get_kdr_timeline`] relative to `now`.
    pub async fn get_kdr_timeline_at(
        &self,
        match_id: &MatchId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Vec<KdrSnapshot> {
        self.load::<KdrHistory>().await.since(match_id, window_start(now, window))
    }

    /// Activity entries of `match_id` recorded within the last `window`.
    pub async fn get_activity_timeline(
        &self,
        match_id: &MatchId,
        window: Duration,
    ) -> Vec<ActivitySnapshot> {
        self.get_activity_timeline_at(match_id, window, Utc::now())
            .await
    }

    /// [`QueryService::get_activity_timeline`] relative to `now`.
    pub async fn get_activity_timeline_at(
        &self,
        match_id: &MatchId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Vec<ActivitySnapshot> {
        self.load::<ActivityHistory>()
            .await
            .since(match_id, window_start(now, window))
    }

    /// Most recent K/D entry of `match_id`.
    pub async fn latest_kdr(&self, match_id: &MatchId) -> Option<KdrSnapshot> {
        self.load::<KdrHistory>().await.latest(match_id).cloned()
    }

    /// Returns `true` while `match_id` is the live matchup for its worlds.
    pub async fn is_current(&self, match_id: &MatchId) -> bool {
        self.is_current_at(match_id, Utc::now()).await
    }

    /// [`QueryService::is_current`] evaluated at `now`.
    pub async fn is_current_at(&self, match_id: &MatchId, now: DateTime<Utc>) -> bool {
        is_current_in(&self.load::<GuildRegistry>().await, match_id, now)
    }

    /// The live matchup of `world_id`, if tracked.
    pub async fn current_match_id(&self, world_id: u32) -> Option<MatchId> {
        current_for_world(&self.load::<GuildRegistry>().await, world_id, Utc::now())
    }

    /// Full record of `match_id`.
    pub async fn match_summary(&self, match_id: &MatchId) -> Option<MatchRecord> {
        self.load::<GuildRegistry>()
            .await
            .matches
            .remove(match_id)
    }

    /// Every tracked matchup, most recently updated first.
    pub async fn active_matches(&self) -> Vec<MatchStatus> {
        let now = Utc::now();
        let registry = self.load::<GuildRegistry>().await;
        let mut matches: Vec<MatchStatus> = registry
            .matches
            .values()
            .map(|record| MatchStatus {
                match_id: record.match_id.clone(),
                is_current: record.is_current(now),
                end_time: record.end_time,
                last_updated: record.last_updated,
                guild_count: record.guild_count(),
            })
            .collect();
        matches.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        matches
    }
}
