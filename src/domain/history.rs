//! Per-cycle derived metrics and the retention-bounded series holding them.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{MatchId, MatchSnapshot, PerTeam};

/// Objective categories always present in an activity breakdown.
pub const STANDARD_OBJECTIVE_TYPES: [&str; 4] = ["Camp", "Tower", "Keep", "Castle"];

/// Start of a lookback `window` ending at `now`.
///
/// Saturates at the earliest representable instant, so an oversized
/// window means "everything".
#[must_use]
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// An entry of a time series.
pub trait Timestamped {
    /// When the entry was recorded.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Kill/death figures of one team at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamKdr {
    /// Cumulative kills.
    pub kills: u64,
    /// Cumulative deaths.
    pub deaths: u64,
    /// `kills / max(deaths, 1)`, rounded to two decimals.
    pub kdr: f64,
}

impl TeamKdr {
    /// Derives the ratio from raw counts.
    #[must_use]
    pub fn new(kills: u64, deaths: u64) -> Self {
        let ratio = kills as f64 / deaths.max(1) as f64;
        Self {
            kills,
            deaths,
            kdr: (ratio * 100.0).round() / 100.0,
        }
    }
}

/// K/D figures for all teams at one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdrSnapshot {
    /// When the snapshot was recorded.
    pub timestamp: DateTime<Utc>,
    /// Per-team figures.
    pub teams: PerTeam<TeamKdr>,
}

impl KdrSnapshot {
    /// Derives per-team ratios from a match snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &MatchSnapshot, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            teams: PerTeam::from_fn(|team| {
                TeamKdr::new(*snapshot.kills.get(team), *snapshot.deaths.get(team))
            }),
        }
    }
}

impl Timestamped for KdrSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Objective ownership of one team at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamActivity {
    /// Total objectives owned.
    pub objectives: u32,
    /// Owned objectives by category.
    pub types: BTreeMap<String, u32>,
}

impl Default for TeamActivity {
    fn default() -> Self {
        Self {
            objectives: 0,
            types: STANDARD_OBJECTIVE_TYPES
                .iter()
                .map(|t| ((*t).to_string(), 0))
                .collect(),
        }
    }
}

/// Objective ownership for all teams at one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    /// When the snapshot was recorded.
    pub timestamp: DateTime<Utc>,
    /// Per-team ownership.
    pub teams: PerTeam<TeamActivity>,
}

impl ActivitySnapshot {
    /// Counts owned objectives per team and category. Neutral objectives
    /// are not counted.
    #[must_use]
    pub fn from_snapshot(snapshot: &MatchSnapshot, timestamp: DateTime<Utc>) -> Self {
        let mut teams = PerTeam::<TeamActivity>::default();
        for (_, objective) in snapshot.objectives() {
            let Some(team) = objective.owner_team() else {
                continue;
            };
            let activity = teams.get_mut(team);
            activity.objectives = activity.objectives.saturating_add(1);
            let count = activity
                .types
                .entry(objective.objective_type.clone())
                .or_insert(0);
            *count = count.saturating_add(1);
        }
        Self { timestamp, teams }
    }
}

impl Timestamped for ActivitySnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Append-only series per matchup, pruned by age.
///
/// Serializes as a plain `{match_id: [entries...]}` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History<S> {
    /// Entries per matchup, oldest first.
    pub series: BTreeMap<MatchId, Vec<S>>,
}

impl<S> Default for History<S> {
    fn default() -> Self {
        Self {
            series: BTreeMap::new(),
        }
    }
}

impl<S: Timestamped + Clone> History<S> {
    /// Appends an entry built for `now`, clamped so the series never goes
    /// backwards in time. Returns the timestamp actually used.
    pub fn append_with(
        &mut self,
        match_id: &MatchId,
        now: DateTime<Utc>,
        build: impl FnOnce(DateTime<Utc>) -> S,
    ) -> DateTime<Utc> {
        let series = self.series.entry(match_id.clone()).or_default();
        let timestamp = series
            .last()
            .map_or(now, |last| last.timestamp().max(now));
        series.push(build(timestamp));
        timestamp
    }

    /// Drops every entry older than `cutoff` across all matchups and
    /// removes series left empty. Returns the number of entries removed.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for entries in self.series.values_mut() {
            let before = entries.len();
            entries.retain(|entry| entry.timestamp() >= cutoff);
            removed += before - entries.len();
        }
        self.series.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Entries of `match_id` recorded at or after `since`, oldest first.
    #[must_use]
    pub fn since(&self, match_id: &MatchId, since: DateTime<Utc>) -> Vec<S> {
        self.series
            .get(match_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.timestamp() >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Most recent entry of `match_id`.
    #[must_use]
    pub fn latest(&self, match_id: &MatchId) -> Option<&S> {
        self.series.get(match_id).and_then(|entries| entries.last())
    }
}

/// K/D history document.
pub type KdrHistory = History<KdrSnapshot>;

/// Activity history document.
pub type ActivityHistory = History<ActivitySnapshot>;

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{MapSnapshot, ObjectiveSnapshot, Team, TeamWorlds};

    fn ts(minute: i64) -> DateTime<Utc> {
        let Some(t) = DateTime::from_timestamp(1_790_000_000 + minute * 60, 0) else {
            panic!("valid timestamp");
        };
        t
    }

    fn snapshot(kills: PerTeam<u64>, deaths: PerTeam<u64>) -> MatchSnapshot {
        let objective = |owner: &str, kind: &str| ObjectiveSnapshot {
            id: format!("{owner}-{kind}"),
            objective_type: kind.to_string(),
            owner: owner.to_string(),
            ..ObjectiveSnapshot::default()
        };
        MatchSnapshot {
            id: MatchId::from("1-2"),
            start_time: ts(0),
            end_time: ts(10_080),
            worlds: PerTeam::<TeamWorlds>::default(),
            kills,
            deaths,
            maps: vec![MapSnapshot {
                id: 38,
                map_type: "Center".to_string(),
                objectives: vec![
                    objective("Red", "Tower"),
                    objective("Red", "Camp"),
                    objective("Green", "Keep"),
                    objective("Neutral", "Camp"),
                    objective("Blue", "Ruins"),
                ],
            }],
        }
    }

    #[test]
    fn kdr_divides_by_deaths() {
        assert!((TeamKdr::new(120, 40).kdr - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn kdr_guards_zero_deaths() {
        let kdr = TeamKdr::new(10, 0);
        assert!((kdr.kdr - 10.0).abs() < f64::EPSILON);
        assert_eq!(kdr.deaths, 0);
    }

    #[test]
    fn kdr_rounds_to_two_decimals() {
        assert!((TeamKdr::new(10, 3).kdr - 3.33).abs() < 1e-9);
    }

    #[test]
    fn kdr_snapshot_covers_all_teams() {
        let kills = PerTeam {
            red: 5,
            green: 120,
            blue: 10,
        };
        let deaths = PerTeam {
            red: 5,
            green: 40,
            blue: 0,
        };
        let snap = KdrSnapshot::from_snapshot(&snapshot(kills, deaths), ts(1));
        assert!((snap.teams.get(Team::Green).kdr - 3.0).abs() < f64::EPSILON);
        assert!((snap.teams.get(Team::Blue).kdr - 10.0).abs() < f64::EPSILON);
        assert!((snap.teams.get(Team::Red).kdr - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn activity_counts_owned_objectives_by_type() {
        let snap = ActivitySnapshot::from_snapshot(
            &snapshot(PerTeam::default(), PerTeam::default()),
            ts(1),
        );
        assert_eq!(snap.teams.red.objectives, 2);
        assert_eq!(snap.teams.red.types.get("Tower"), Some(&1));
        assert_eq!(snap.teams.red.types.get("Castle"), Some(&0));
        assert_eq!(snap.teams.green.types.get("Keep"), Some(&1));
        assert_eq!(snap.teams.blue.types.get("Ruins"), Some(&1));
        let total: u32 = snap.teams.iter().map(|(_, a)| a.objectives).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn window_start_saturates() {
        assert_eq!(window_start(ts(60), Duration::minutes(60)), ts(0));
        assert_eq!(window_start(ts(0), Duration::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn append_never_goes_backwards() {
        let mut history = KdrHistory::default();
        let id = MatchId::from("1-2");
        let build = |t| KdrSnapshot {
            timestamp: t,
            teams: PerTeam::default(),
        };
        history.append_with(&id, ts(10), build);
        let used = history.append_with(&id, ts(5), build);
        assert_eq!(used, ts(10));
        let series = history.since(&id, ts(0));
        assert_eq!(series.len(), 2);
        assert!(series.windows(2).all(|w| matches!(w, [a, b] if a.timestamp <= b.timestamp)));
    }

    #[test]
    fn prune_drops_old_entries_and_empty_series() {
        let mut history = KdrHistory::default();
        let old = MatchId::from("1-1");
        let live = MatchId::from("1-2");
        let build = |t| KdrSnapshot {
            timestamp: t,
            teams: PerTeam::default(),
        };
        history.append_with(&old, ts(0), build);
        history.append_with(&live, ts(0), build);
        history.append_with(&live, ts(100), build);

        let removed = history.prune_before(ts(50));
        assert_eq!(removed, 2);
        assert!(!history.series.contains_key(&old));
        assert_eq!(history.since(&live, ts(0)).len(), 1);
        assert_eq!(history.latest(&live).map(|s| s.timestamp), Some(ts(100)));
    }
}
