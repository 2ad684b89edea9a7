//! Persisted document types and their stable names.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{ActivityHistory, KdrHistory, MatchId, MatchRecord};

/// A named, independently locked and committed JSON document.
pub trait Document: Serialize + DeserializeOwned + Default + Send + 'static {
    /// Stable name; the document lives at `<data_dir>/<NAME>.json`.
    const NAME: &'static str;
}

/// Guild registry document: every tracked matchup by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildRegistry {
    /// Records keyed by matchup id.
    pub matches: BTreeMap<MatchId, MatchRecord>,
}

impl GuildRegistry {
    /// Returns the record for `match_id`.
    #[must_use]
    pub fn get(&self, match_id: &MatchId) -> Option<&MatchRecord> {
        self.matches.get(match_id)
    }
}

impl Document for GuildRegistry {
    const NAME: &'static str = "current_match";
}

impl Document for KdrHistory {
    const NAME: &'static str = "kdr_history";
}

impl Document for ActivityHistory {
    const NAME: &'static str = "activity_history";
}
