//! Upstream match-state source.
//!
//! The engine only depends on [`MatchSource`]; [`gw2::Gw2Client`] is the
//! production implementation against the public GW2 API.

pub mod gw2;
pub mod models;

use futures_util::future::BoxFuture;

use crate::domain::MatchSnapshot;
use crate::error::TrackerError;

pub use gw2::Gw2Client;

/// Provider of point-in-time match state.
pub trait MatchSource: Send + Sync + std::fmt::Debug {
    /// Fetches the matchup `world_id` currently takes part in, with guild
    /// identities resolved where possible.
    fn fetch_current_match(&self, world_id: u32)
    -> BoxFuture<'_, Result<MatchSnapshot, TrackerError>>;
}
