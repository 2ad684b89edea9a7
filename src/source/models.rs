//! Raw GW2 API v2 payloads and their conversion into [`MatchSnapshot`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{
    MapSnapshot, MatchId, MatchSnapshot, ObjectiveSnapshot, PerTeam, TeamWorlds, WorldRef,
};

/// `GET /v2/wvw/matches` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMatch {
    /// Matchup id (e.g. `"1-2"`).
    pub id: String,
    /// Start of the matchup.
    pub start_time: DateTime<Utc>,
    /// End of the matchup.
    pub end_time: DateTime<Utc>,
    /// Main world per team.
    pub worlds: PerTeam<u32>,
    /// Every world per team, main included.
    #[serde(default)]
    pub all_worlds: PerTeam<Vec<u32>>,
    /// Cumulative kills per team.
    #[serde(default)]
    pub kills: PerTeam<u64>,
    /// Cumulative deaths per team.
    #[serde(default)]
    pub deaths: PerTeam<u64>,
    /// Per-map state.
    #[serde(default)]
    pub maps: Vec<RawMap>,
}

impl RawMatch {
    /// Returns `true` if `world_id` plays on any team of this matchup.
    #[must_use]
    pub fn involves_world(&self, world_id: u32) -> bool {
        self.worlds.iter().any(|(_, main)| *main == world_id)
            || self.all_worlds.iter().any(|(_, ids)| ids.contains(&world_id))
    }

    /// Distinct non-blank claiming guild ids, in first-seen order.
    #[must_use]
    pub fn claiming_guilds(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for objective in self.maps.iter().flat_map(|m| m.objectives.iter()) {
            if let Some(id) = objective.claimed_by.as_deref().map(str::trim)
                && !id.is_empty()
                && !seen.iter().any(|s: &String| s == id)
            {
                seen.push(id.to_string());
            }
        }
        seen
    }
}

/// One map inside a [`RawMatch`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawMap {
    /// Map id.
    pub id: u32,
    /// Map kind (`Center`, `RedHome`, ...).
    #[serde(rename = "type")]
    pub map_type: String,
    /// Objectives on the map.
    #[serde(default)]
    pub objectives: Vec<RawObjective>,
}

/// One objective inside a [`RawMap`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawObjective {
    /// Objective id.
    pub id: String,
    /// Objective kind.
    #[serde(rename = "type", default = "unknown_type")]
    pub objective_type: String,
    /// Owning side.
    #[serde(default = "neutral_owner")]
    pub owner: String,
    /// Claiming guild id.
    #[serde(default)]
    pub claimed_by: Option<String>,
    /// Claim time.
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    /// Supply deliveries.
    #[serde(default)]
    pub yaks_delivered: Option<u32>,
}

fn unknown_type() -> String {
    "Unknown".to_string()
}

fn neutral_owner() -> String {
    "Neutral".to_string()
}

/// `GET /v2/worlds` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorld {
    /// World id.
    pub id: u32,
    /// Display name.
    pub name: String,
}

/// Public part of `GET /v2/guild/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuildIdentity {
    /// Guild id.
    pub id: String,
    /// Guild name.
    pub name: String,
    /// Guild tag.
    #[serde(default)]
    pub tag: String,
}

fn world_ref(id: u32, names: &HashMap<u32, String>) -> WorldRef {
    WorldRef {
        id,
        name: names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("World {id}")),
    }
}

/// Converts a raw match into a [`MatchSnapshot`], resolving world names and
/// guild identities from the supplied lookups.
///
/// Worlds without a known name become `"World <id>"`; guilds without a
/// known identity keep `guild_name`/`guild_tag` unset.
#[must_use]
pub fn build_snapshot(
    raw: RawMatch,
    world_names: &HashMap<u32, String>,
    guilds: &HashMap<String, GuildIdentity>,
) -> MatchSnapshot {
    let worlds = PerTeam::from_fn(|team| {
        let main = *raw.worlds.get(team);
        let main_ref = world_ref(main, world_names);
        TeamWorlds {
            main_world_id: main,
            main_world_name: main_ref.name,
            linked_worlds: raw
                .all_worlds
                .get(team)
                .iter()
                .filter(|id| **id != main)
                .map(|id| world_ref(*id, world_names))
                .collect(),
        }
    });

    let maps = raw
        .maps
        .into_iter()
        .map(|map| MapSnapshot {
            id: map.id,
            map_type: map.map_type,
            objectives: map
                .objectives
                .into_iter()
                .map(|obj| {
                    let identity = obj
                        .claimed_by
                        .as_deref()
                        .and_then(|id| guilds.get(id.trim()));
                    ObjectiveSnapshot {
                        id: obj.id,
                        objective_type: obj.objective_type,
                        owner: obj.owner,
                        guild_name: identity.map(|g| g.name.clone()),
                        guild_tag: identity.map(|g| g.tag.clone()),
                        claimed_by: obj.claimed_by,
                        claimed_at: obj.claimed_at,
                        yaks_delivered: obj.yaks_delivered,
                    }
                })
                .collect(),
        })
        .collect();

    MatchSnapshot {
        id: MatchId::new(raw.id),
        start_time: raw.start_time,
        end_time: raw.end_time,
        worlds,
        kills: raw.kills,
        deaths: raw.deaths,
        maps,
    }
}
