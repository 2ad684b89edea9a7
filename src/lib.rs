//! # wvw-tracker
//!
//! Historical tracking and guild discovery for Guild Wars 2 World vs World
//! matchups.
//!
//! Every poll cycle takes one snapshot of the upstream match state and
//! folds it into three independently persisted JSON documents: the per
//! matchup guild registry, the K/D history and the objective activity
//! history. Consumers read them through [`service::QueryService`].
//!
//! ## Architecture
//!
//! ```text
//! PollScheduler (scheduler.rs) ── manual run_cycle callers
//!     │
//!     ├── TrackerEngine (engine.rs)
//!     │       └── MatchSource (source/) ── GW2 API v2
//!     │
//!     ├── MatchLifecycle / GuildDiscovery / TimeSeriesRecorder (service/)
//!     ├── QueryService (service/)
//!     │
//!     ├── Pure merges (domain/)
//!     │
//!     └── DocumentStore (persistence/)
//!             ├── scoped locks (file or in-process)
//!             └── atomic temp-file + rename commits
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod scheduler;
pub mod service;
pub mod source;
