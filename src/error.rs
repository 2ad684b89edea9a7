//! Tracker error types with stable numeric codes.
//!
//! [`TrackerError`] is the central error type for the engine. Every
//! variant carries a numeric code for structured logs and a transient /
//! permanent classification used by the poll scheduler.

/// Engine-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category        | Retried next cycle |
/// |-----------|-----------------|--------------------|
/// | 1000–1999 | Upstream fetch  | yes                |
/// | 2000–2999 | Storage         | yes                |
/// | 3000–3999 | Configuration   | no                 |
/// | 9000      | Internal        | no                 |
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Upstream request failed (network error, connection refused, ...).
    #[error("upstream fetch failed: {0}")]
    Fetch(String),

    /// Upstream fetch did not complete within the configured bound.
    #[error("upstream fetch timed out after {timeout_secs}s")]
    FetchTimeout {
        /// The bound that was exceeded, in seconds.
        timeout_secs: u64,
    },

    /// Upstream answered with a non-success HTTP status.
    #[error("upstream returned status {status} for {endpoint}")]
    UpstreamStatus {
        /// HTTP status code.
        status: u16,
        /// Endpoint path that was requested.
        endpoint: String,
    },

    /// Upstream payload could not be interpreted as a match.
    #[error("could not decode upstream payload: {0}")]
    Decode(String),

    /// Filesystem failure while reading or committing a document.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A scoped document lock could not be acquired.
    #[error("lock error on {document}: {reason}")]
    Lock {
        /// Name of the document being locked.
        document: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Configuration value is present but not usable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal invariant failure (join error, poisoned state).
    #[error("internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Fetch(_) => 1001,
            Self::FetchTimeout { .. } => 1002,
            Self::UpstreamStatus { .. } => 1003,
            Self::Decode(_) => 1004,
            Self::Io(_) => 2001,
            Self::Serialization(_) => 2002,
            Self::Lock { .. } => 2003,
            Self::InvalidConfig(_) => 3001,
            Self::Internal(_) => 9000,
        }
    }

    /// Returns `true` if retrying on the next poll cycle may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_) | Self::Internal(_))
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::UpstreamStatus {
                status: status.as_u16(),
                endpoint: err.url().map(|u| u.path().to_string()).unwrap_or_default(),
            }
        } else {
            Self::Fetch(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for TrackerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.to_string())
    }
}
