//! Type-safe matchup identifier.
//!
//! [`MatchId`] is a newtype wrapper around the opaque upstream string
//! (e.g. `"1-2"`) so that match identifiers cannot be confused with guild
//! or world identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of one weekly matchup instance.
///
/// Assigned upstream and reused for the week; a new value appears when the
/// matchup rotates. Used as the dictionary key in every persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    /// Wraps an upstream identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MatchId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
