//! Domain layer: matchup identity, inbound snapshots, and persisted records.
//!
//! This module contains the pure data model. Every merge or derivation that
//! needs no I/O lives here and takes the current time as an argument, so the
//! service layer only has to wrap it in a document-store transaction.

pub mod history;
pub mod match_id;
pub mod match_record;
pub mod snapshot;
pub mod team;

pub use history::{
    ActivityHistory, ActivitySnapshot, History, KdrHistory, KdrSnapshot, TeamActivity, TeamKdr,
    Timestamped, window_start,
};
pub use match_id::MatchId;
pub use match_record::{GuildEntry, MatchRecord, TeamRecord, UNKNOWN_GUILD_NAME};
pub use snapshot::{MapSnapshot, MatchSnapshot, ObjectiveSnapshot, TeamWorlds, WorldRef};
pub use team::{PerTeam, Team};
