//! Service layer: the operations the poll loop and consumers call.
//!
//! Each service owns a [`crate::persistence::DocumentStore`] handle and
//! wraps a pure domain merge in a single `modify` on one document.
//! Services are cheap to clone and never touch each other's documents.

pub mod discovery;
pub mod lifecycle;
pub mod query;
pub mod recorder;

pub use discovery::{GuildDiscovery, ObserveSummary};
pub use lifecycle::{MatchLifecycle, Resolution};
pub use query::{MatchStatus, QueryService};
pub use recorder::{RecordSummary, TimeSeriesRecorder};
