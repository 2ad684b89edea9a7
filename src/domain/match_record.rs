//! Persisted per-matchup record with its per-team guild registry.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{MatchId, MatchSnapshot, PerTeam, TeamWorlds, WorldRef};

/// Name stored for a claiming guild whose identity could not be resolved.
pub const UNKNOWN_GUILD_NAME: &str = "Unknown Guild";

/// One guild observed claiming objectives for one team in one matchup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildEntry {
    /// Upstream guild id.
    pub id: String,
    /// Guild name, or [`UNKNOWN_GUILD_NAME`] while unresolved.
    pub name: String,
    /// Guild tag, empty while unresolved.
    pub tag: String,
    /// First cycle this guild was observed.
    pub first_seen: DateTime<Utc>,
    /// Most recent cycle this guild was observed.
    pub last_seen: DateTime<Utc>,
    /// Number of cycles in which the guild held at least one objective.
    pub claims_count: u64,
    /// Distinct objective categories ever claimed.
    pub objective_types: BTreeSet<String>,
    /// Distinct maps the guild was observed on.
    pub maps_seen: BTreeSet<String>,
}

impl GuildEntry {
    /// Creates an entry for a guild seen for the first time at `now`.
    ///
    /// The entry starts with `claims_count == 0`; callers record the
    /// observation through [`GuildEntry::record_cycle`].
    #[must_use]
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: UNKNOWN_GUILD_NAME.to_string(),
            tag: String::new(),
            first_seen: now,
            last_seen: now,
            claims_count: 0,
            objective_types: BTreeSet::new(),
            maps_seen: BTreeSet::new(),
        }
    }

    /// Returns `true` while the guild's name has not been resolved.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.name == UNKNOWN_GUILD_NAME
    }

    /// Records one poll cycle in which this guild held objectives.
    ///
    /// Increments `claims_count` by exactly one regardless of how many
    /// objectives were held, and replaces a placeholder identity when the
    /// cycle carried a resolved one.
    pub fn record_cycle<'a>(
        &mut self,
        now: DateTime<Utc>,
        name: Option<&str>,
        tag: Option<&str>,
        objective_types: impl IntoIterator<Item = &'a String>,
        maps: impl IntoIterator<Item = &'a String>,
    ) {
        if now > self.last_seen {
            self.last_seen = now;
        }
        self.claims_count = self.claims_count.saturating_add(1);
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            self.name = name.to_string();
            if let Some(tag) = tag {
                self.tag = tag.to_string();
            }
        }
        self.objective_types.extend(objective_types.into_iter().cloned());
        self.maps_seen.extend(maps.into_iter().cloned());
    }
}

/// Persisted state of one team within a matchup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    /// Primary population id.
    pub main_world_id: u32,
    /// Primary population name.
    pub main_world_name: String,
    /// Subordinate populations, in upstream order.
    pub linked_worlds: Vec<WorldRef>,
    /// Guilds keyed by upstream guild id.
    pub guilds: BTreeMap<String, GuildEntry>,
}

impl TeamRecord {
    fn relink(&mut self, worlds: &TeamWorlds) {
        self.main_world_id = worlds.main_world_id;
        self.main_world_name.clone_from(&worlds.main_world_name);
        self.linked_worlds.clone_from(&worlds.linked_worlds);
    }
}

/// One active or recently-active matchup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Matchup identifier.
    pub match_id: MatchId,
    /// Start of the matchup's validity window.
    pub start_time: DateTime<Utc>,
    /// End of the matchup's validity window.
    pub end_time: DateTime<Utc>,
    /// When this engine first recorded the matchup.
    pub first_seen: DateTime<Utc>,
    /// When this engine last touched the record.
    pub last_updated: DateTime<Utc>,
    /// Every participating world id (main and linked).
    #[serde(default)]
    pub world_ids: BTreeSet<u32>,
    /// Set once a newer matchup was observed for one of our worlds.
    #[serde(default)]
    pub retired_at: Option<DateTime<Utc>>,
    /// Per-team state.
    pub teams: PerTeam<TeamRecord>,
}

impl MatchRecord {
    /// Creates a record for `match_id` from its first snapshot, with empty
    /// guild maps.
    #[must_use]
    pub fn new(match_id: MatchId, snapshot: &MatchSnapshot, now: DateTime<Utc>) -> Self {
        let mut record = Self {
            match_id,
            start_time: snapshot.start_time,
            end_time: snapshot.end_time,
            first_seen: now,
            last_updated: now,
            world_ids: BTreeSet::new(),
            retired_at: None,
            teams: PerTeam::default(),
        };
        record.refresh(snapshot, now);
        record
    }

    /// Refreshes bookkeeping and team linking from a newer snapshot.
    ///
    /// Guild maps are left untouched.
    pub fn refresh(&mut self, snapshot: &MatchSnapshot, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
        self.start_time = snapshot.start_time;
        self.end_time = snapshot.end_time;
        self.world_ids = snapshot.world_ids();
        for (team, worlds) in snapshot.worlds.iter() {
            self.teams.get_mut(team).relink(worlds);
        }
    }

    /// Returns `true` if any of `worlds` takes part in this matchup.
    #[must_use]
    pub fn shares_world_with(&self, worlds: &BTreeSet<u32>) -> bool {
        !self.world_ids.is_disjoint(worlds)
    }

    /// A record is current while it has not been superseded and its
    /// validity window has not ended.
    #[must_use]
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.retired_at.is_none() && now <= self.end_time
    }

    /// A record is stale once superseded, or once `now` passes `end_time`
    /// by more than `grace`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        self.retired_at.is_some()
            || self
                .end_time
                .checked_add_signed(grace)
                .is_some_and(|deadline| now > deadline)
    }

    /// Total number of guild entries across the three teams.
    #[must_use]
    pub fn guild_count(&self) -> usize {
        self.teams.iter().map(|(_, team)| team.guilds.len()).sum()
    }
}
