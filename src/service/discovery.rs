//! Guild discovery: folds claimed objectives into the per-team registries.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::domain::{GuildEntry, MatchId, MatchRecord, MatchSnapshot, Team};
use crate::error::TrackerError;
use crate::persistence::{DocumentStore, GuildRegistry};

/// Everything one snapshot says about one guild on one team.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimObservation {
    /// Resolved name, if any objective carried one.
    pub name: Option<String>,
    /// Resolved tag, if any objective carried one.
    pub tag: Option<String>,
    /// Distinct objective categories held.
    pub objective_types: BTreeSet<String>,
    /// Distinct maps the guild held objectives on.
    pub maps: BTreeSet<String>,
}

/// Result of one [`GuildDiscovery::observe`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveSummary {
    /// `(team, guild)` pairs counted in this cycle.
    pub observed: usize,
    /// Pairs seen for the first time.
    pub discovered: usize,
    /// Placeholder identities replaced by resolved ones.
    pub resolved: usize,
}

/// Groups the snapshot's claimed objectives by owning team and guild id.
///
/// Objectives without a claiming guild or without a team owner are
/// skipped.
#[must_use]
pub fn collect_claims(snapshot: &MatchSnapshot) -> BTreeMap<(Team, String), ClaimObservation> {
    let mut claims: BTreeMap<(Team, String), ClaimObservation> = BTreeMap::new();
    for (map, objective) in snapshot.objectives() {
        let (Some(guild_id), Some(team)) = (objective.claiming_guild(), objective.owner_team())
        else {
            continue;
        };
        let claim = claims.entry((team, guild_id.to_string())).or_default();
        if claim.name.is_none()
            && let Some(name) = objective.guild_name.as_deref().filter(|n| !n.is_empty())
        {
            claim.name = Some(name.to_string());
            claim.tag.clone_from(&objective.guild_tag);
        }
        claim
            .objective_types
            .insert(objective.objective_type.clone());
        claim.maps.insert(map.map_type.clone());
    }
    claims
}

/// Merges one cycle's claims into `record`.
///
/// Each `(team, guild)` pair is counted once regardless of how many
/// objectives it held.
pub fn merge_claims(
    record: &mut MatchRecord,
    claims: &BTreeMap<(Team, String), ClaimObservation>,
    now: DateTime<Utc>,
) -> ObserveSummary {
    let mut summary = ObserveSummary::default();
    for ((team, guild_id), claim) in claims {
        let guilds = &mut record.teams.get_mut(*team).guilds;
        let entry = guilds.entry(guild_id.clone()).or_insert_with(|| {
            summary.discovered += 1;
            GuildEntry::new(guild_id.clone(), now)
        });
        let was_unresolved = entry.is_unresolved();
        entry.record_cycle(
            now,
            claim.name.as_deref(),
            claim.tag.as_deref(),
            &claim.objective_types,
            &claim.maps,
        );
        if was_unresolved && !entry.is_unresolved() && entry.claims_count > 1 {
            summary.resolved += 1;
        }
        summary.observed += 1;
    }
    summary
}

/// Builds the per-matchup guild registry from repeated snapshots.
#[derive(Debug, Clone)]
pub struct GuildDiscovery {
    store: DocumentStore,
}

impl GuildDiscovery {
    /// Creates a discovery engine over `store`.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Records one poll cycle of claims for `match_id`.
    ///
    /// Runs as a single registry transaction. A missing record is created
    /// from `snapshot`, so `observe` does not depend on a prior resolve
    /// having succeeded.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackerError`] if the registry cannot be locked or
    /// committed.
    pub async fn observe(
        &self,
        match_id: &MatchId,
        snapshot: &MatchSnapshot,
    ) -> Result<ObserveSummary, TrackerError> {
        self.observe_with(match_id, snapshot, Utc::now).await
    }

    /// [`GuildDiscovery::observe`] with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// See [`GuildDiscovery::observe`].
    pub async fn observe_at(
        &self,
        match_id: &MatchId,
        snapshot: &MatchSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ObserveSummary, TrackerError> {
        self.observe_with(match_id, snapshot, move || now).await
    }

    async fn observe_with(
        &self,
        match_id: &MatchId,
        snapshot: &MatchSnapshot,
        clock: impl FnOnce() -> DateTime<Utc>,
    ) -> Result<ObserveSummary, TrackerError> {
        let claims = collect_claims(snapshot);
        let summary = self
            .store
            .modify(|registry: &mut GuildRegistry| {
                // Read the clock under the lock so concurrent cycles
                // commit in timestamp order.
                let now = clock();
                let record = registry
                    .matches
                    .entry(match_id.clone())
                    .or_insert_with(|| MatchRecord::new(match_id.clone(), snapshot, now));
                merge_claims(record, &claims, now)
            })
            .await?;

        tracing::debug!(
            match_id = %match_id,
            observed = summary.observed,
            discovered = summary.discovered,
            resolved = summary.resolved,
            "guild claims merged"
        );
        if summary.discovered > 0 {
            tracing::info!(
                match_id = %match_id,
                count = summary.discovered,
                "new guilds discovered"
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{MapSnapshot, ObjectiveSnapshot, PerTeam, TeamWorlds, UNKNOWN_GUILD_NAME};

    fn ts(minute: i64) -> DateTime<Utc> {
        let Some(t) = DateTime::from_timestamp(1_790_000_000 + minute * 60, 0) else {
            panic!("valid timestamp");
        };
        t
    }

    fn claimed(
        id: &str,
        kind: &str,
        owner: &str,
        guild: &str,
        name: Option<&str>,
    ) -> ObjectiveSnapshot {
        ObjectiveSnapshot {
            id: id.to_string(),
            objective_type: kind.to_string(),
            owner: owner.to_string(),
            claimed_by: Some(guild.to_string()),
            guild_name: name.map(str::to_string),
            guild_tag: name.map(|n| n.chars().take(3).collect::<String>().to_uppercase()),
            ..ObjectiveSnapshot::default()
        }
    }

    fn snapshot(maps: Vec<MapSnapshot>) -> MatchSnapshot {
        MatchSnapshot {
            id: MatchId::from("1-2"),
            start_time: ts(0),
            end_time: ts(10_080),
            worlds: PerTeam::<TeamWorlds>::default(),
            kills: PerTeam::default(),
            deaths: PerTeam::default(),
            maps,
        }
    }

    fn map(map_type: &str, objectives: Vec<ObjectiveSnapshot>) -> MapSnapshot {
        MapSnapshot {
            id: 38,
            map_type: map_type.to_string(),
            objectives,
        }
    }

    #[test]
    fn claims_group_by_team_and_guild() {
        let snap = snapshot(vec![
            map(
                "Center",
                vec![
                    claimed("38-1", "Tower", "Red", "g1", Some("Foo")),
                    claimed("38-2", "Keep", "Red", "g1", None),
                    claimed("38-3", "Camp", "Neutral", "g2", None),
                    claimed("38-4", "Camp", "Blue", " ", None),
                ],
            ),
            map("RedHome", vec![claimed("95-1", "Camp", "Red", "g1", None)]),
        ]);
        let claims = collect_claims(&snap);
        assert_eq!(claims.len(), 1);
        let Some(claim) = claims.get(&(Team::Red, "g1".to_string())) else {
            panic!("g1 missing");
        };
        assert_eq!(claim.name.as_deref(), Some("Foo"));
        assert_eq!(claim.objective_types.len(), 3);
        assert_eq!(claim.maps.len(), 2);
    }

    #[test]
    fn same_guild_on_two_teams_is_two_entries() {
        let snap = snapshot(vec![map(
            "Center",
            vec![
                claimed("38-1", "Tower", "Red", "g1", None),
                claimed("38-2", "Tower", "Green", "g1", None),
            ],
        )]);
        assert_eq!(collect_claims(&snap).len(), 2);
    }

    #[test]
    fn merge_counts_once_per_cycle() {
        let snap = snapshot(vec![map(
            "Center",
            vec![
                claimed("38-1", "Tower", "Red", "g1", Some("Foo")),
                claimed("38-2", "Camp", "Red", "g1", Some("Foo")),
            ],
        )]);
        let claims = collect_claims(&snap);
        let mut record = MatchRecord::new(MatchId::from("1-2"), &snap, ts(0));

        let first = merge_claims(&mut record, &claims, ts(0));
        assert_eq!(first, ObserveSummary { observed: 1, discovered: 1, resolved: 0 });
        let second = merge_claims(&mut record, &claims, ts(15));
        assert_eq!(second.discovered, 0);

        let Some(entry) = record.teams.red.guilds.get("g1") else {
            panic!("g1 missing");
        };
        assert_eq!(entry.claims_count, 2);
        assert_eq!(entry.first_seen, ts(0));
        assert_eq!(entry.last_seen, ts(15));
    }

    #[test]
    fn unresolved_guild_is_tracked_then_resolved() {
        let unresolved = snapshot(vec![map(
            "Center",
            vec![claimed("38-1", "Tower", "Blue", "g9", None)],
        )]);
        let resolved = snapshot(vec![map(
            "Center",
            vec![claimed("38-1", "Tower", "Blue", "g9", Some("Late Name"))],
        )]);
        let mut record = MatchRecord::new(MatchId::from("1-2"), &unresolved, ts(0));

        merge_claims(&mut record, &collect_claims(&unresolved), ts(0));
        let Some(entry) = record.teams.blue.guilds.get("g9") else {
            panic!("g9 missing");
        };
        assert_eq!(entry.name, UNKNOWN_GUILD_NAME);

        let summary = merge_claims(&mut record, &collect_claims(&resolved), ts(15));
        assert_eq!(summary.resolved, 1);
        let Some(entry) = record.teams.blue.guilds.get("g9") else {
            panic!("g9 missing");
        };
        assert_eq!(entry.name, "Late Name");
        assert_eq!(entry.tag, "LAT");
    }

    #[tokio::test]
    async fn observe_creates_missing_record() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let Ok(store) =
            DocumentStore::open(dir.path(), crate::persistence::LockBackend::Process).await
        else {
            panic!("store open failed");
        };
        let discovery = GuildDiscovery::new(store.clone());
        let snap = snapshot(vec![map(
            "Center",
            vec![claimed("38-1", "Tower", "Red", "g1", Some("Foo"))],
        )]);

        let Ok(summary) = discovery.observe_at(&snap.id, &snap, ts(1)).await else {
            panic!("observe failed");
        };
        assert_eq!(summary.discovered, 1);

        let Ok(registry) = store.read::<GuildRegistry>().await else {
            panic!("read failed");
        };
        let Some(record) = registry.get(&snap.id) else {
            panic!("record missing");
        };
        assert_eq!(record.teams.red.guilds.len(), 1);
    }
}
