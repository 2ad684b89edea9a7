//! Team colors and the fixed three-slot per-team container.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three color-coded sides of a matchup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    /// Red side.
    Red,
    /// Green side.
    Green,
    /// Blue side.
    Blue,
}

impl Team {
    /// All teams in display order.
    pub const ALL: [Self; 3] = [Self::Red, Self::Green, Self::Blue];

    /// Lowercase color name, as used in persisted documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }

    /// Parses an upstream owner string (`"Red"`, `"green"`, ...).
    ///
    /// Returns `None` for `"Neutral"` and anything else that is not a team.
    #[must_use]
    pub fn from_owner(owner: &str) -> Option<Self> {
        owner.parse().ok()
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "green" => Ok(Self::Green),
            "blue" => Ok(Self::Blue),
            other => Err(format!("not a team color: {other:?}")),
        }
    }
}

/// Exactly one value per team.
///
/// Serializes as `{"red": .., "green": .., "blue": ..}` and accepts the
/// capitalized keys some upstream payloads use. Missing keys fall back to
/// `T::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerTeam<T> {
    /// Red team value.
    #[serde(alias = "Red")]
    pub red: T,
    /// Green team value.
    #[serde(alias = "Green")]
    pub green: T,
    /// Blue team value.
    #[serde(alias = "Blue")]
    pub blue: T,
}

impl<T> PerTeam<T> {
    /// Builds a value for each team from `f`.
    pub fn from_fn(mut f: impl FnMut(Team) -> T) -> Self {
        Self {
            red: f(Team::Red),
            green: f(Team::Green),
            blue: f(Team::Blue),
        }
    }

    /// Returns the value for `team`.
    #[must_use]
    pub const fn get(&self, team: Team) -> &T {
        match team {
            Team::Red => &self.red,
            Team::Green => &self.green,
            Team::Blue => &self.blue,
        }
    }

    /// Returns the value for `team` mutably.
    pub const fn get_mut(&mut self, team: Team) -> &mut T {
        match team {
            Team::Red => &mut self.red,
            Team::Green => &mut self.green,
            Team::Blue => &mut self.blue,
        }
    }

    /// Iterates `(team, value)` pairs in [`Team::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Team, &T)> {
        Team::ALL.into_iter().map(move |team| (team, self.get(team)))
    }

    /// Applies `f` to every value.
    pub fn map<U>(&self, mut f: impl FnMut(Team, &T) -> U) -> PerTeam<U> {
        PerTeam::from_fn(|team| f(team, self.get(team)))
    }
}
