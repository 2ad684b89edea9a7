//! Point-in-time match state consumed from the upstream source.
//!
//! A [`MatchSnapshot`] is produced once per fetch by a
//! [`crate::source::MatchSource`] and is read-only from the engine's point
//! of view.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MatchId, PerTeam, Team};

/// A world (server population) participating in a matchup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldRef {
    /// Upstream world id.
    pub id: u32,
    /// Display name, or `"World <id>"` when unresolved.
    pub name: String,
}

/// World composition of one team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamWorlds {
    /// The team's primary population.
    pub main_world_id: u32,
    /// Display name of the primary population.
    pub main_world_name: String,
    /// Subordinate populations sharing the team, in upstream order.
    #[serde(default)]
    pub linked_worlds: Vec<WorldRef>,
}

impl TeamWorlds {
    /// Ids of the main world and every linked world.
    pub fn world_ids(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::once(self.main_world_id).chain(self.linked_worlds.iter().map(|w| w.id))
    }
}

/// One capturable objective as reported in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveSnapshot {
    /// Upstream objective id (e.g. `"38-6"`).
    pub id: String,
    /// Objective category (`Camp`, `Tower`, `Keep`, `Castle`, ...).
    #[serde(rename = "type")]
    pub objective_type: String,
    /// Owning side as reported upstream (`"Red"`, `"Neutral"`, ...).
    pub owner: String,
    /// Claiming guild id, if any.
    #[serde(default)]
    pub claimed_by: Option<String>,
    /// Resolved guild name, if the identity lookup succeeded.
    #[serde(default)]
    pub guild_name: Option<String>,
    /// Resolved guild tag, if the identity lookup succeeded.
    #[serde(default)]
    pub guild_tag: Option<String>,
    /// When the current claim was made.
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    /// Upgrade-progress counter (supply deliveries).
    #[serde(default)]
    pub yaks_delivered: Option<u32>,
}

impl ObjectiveSnapshot {
    /// The owning team, or `None` for neutral or unrecognized owners.
    #[must_use]
    pub fn owner_team(&self) -> Option<Team> {
        Team::from_owner(&self.owner)
    }

    /// The claiming guild id, ignoring blank values.
    #[must_use]
    pub fn claiming_guild(&self) -> Option<&str> {
        self.claimed_by
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// One map of the matchup with its objectives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSnapshot {
    /// Upstream map id.
    pub id: u32,
    /// Map identifier used for `maps_seen` (e.g. `"Center"`, `"RedHome"`).
    #[serde(rename = "type")]
    pub map_type: String,
    /// Objectives on this map.
    #[serde(default)]
    pub objectives: Vec<ObjectiveSnapshot>,
}

/// A single point-in-time read of the upstream match state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Matchup identifier.
    pub id: MatchId,
    /// Start of the matchup's validity window.
    pub start_time: DateTime<Utc>,
    /// End of the matchup's validity window.
    pub end_time: DateTime<Utc>,
    /// World composition per team.
    pub worlds: PerTeam<TeamWorlds>,
    /// Cumulative kills per team.
    #[serde(default)]
    pub kills: PerTeam<u64>,
    /// Cumulative deaths per team.
    #[serde(default)]
    pub deaths: PerTeam<u64>,
    /// Maps with their objectives.
    #[serde(default)]
    pub maps: Vec<MapSnapshot>,
}

impl MatchSnapshot {
    /// Every world id taking part in the matchup.
    #[must_use]
    pub fn world_ids(&self) -> BTreeSet<u32> {
        self.worlds
            .iter()
            .flat_map(|(_, worlds)| worlds.world_ids())
            .collect()
    }

    /// Iterates every objective together with the map it sits on.
    pub fn objectives(&self) -> impl Iterator<Item = (&MapSnapshot, &ObjectiveSnapshot)> {
        self.maps
            .iter()
            .flat_map(|map| map.objectives.iter().map(move |obj| (map, obj)))
    }
}
