//! Tracker configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Numeric values that fail to parse fall
//! back to their defaults; enumerated values that fail to parse are
//! rejected.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TrackerError;
use crate::persistence::LockBackend;

/// Upper bound on `TRACKER_RETENTION_DAYS` (ten years).
pub const MAX_RETENTION_DAYS: u32 = 3650;

/// Upper bound on `TRACKER_END_GRACE_MINUTES` (one matchup week).
pub const MAX_END_GRACE_MINUTES: u32 = 7 * 24 * 60;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TrackerError::InvalidConfig(format!(
                "unknown LOG_FORMAT {other:?}"
            ))),
        }
    }
}

/// Top-level tracker configuration.
///
/// Loaded once at startup via [`TrackerConfig::from_env`] and handed to
/// [`crate::engine::TrackerEngine::open`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Directory holding the persisted documents.
    pub data_dir: PathBuf,

    /// World whose matchup the scheduler follows.
    pub world_id: u32,

    /// Sleep between two scheduled cycles.
    pub poll_interval: Duration,

    /// Upper bound on a single upstream fetch.
    pub fetch_timeout: Duration,

    /// Time-series entries and stale records older than this are pruned.
    pub retention_days: u32,

    /// Margin past a match's `end_time` before it is treated as stale.
    pub end_grace_minutes: u32,

    /// Scoped-lock implementation for the document store.
    pub lock_backend: LockBackend,

    /// Run a single cycle and exit instead of scheduling.
    pub run_once: bool,

    /// Base URL of the upstream match-state API.
    pub api_base_url: String,

    /// Maximum distinct guild identities resolved per fetch.
    pub guild_lookup_limit: usize,

    /// Concurrent guild identity requests.
    pub guild_lookup_concurrency: usize,

    /// Tracing output format.
    pub log_format: LogFormat,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("wvw_data"),
            world_id: 1020,
            poll_interval: Duration::from_secs(15 * 60),
            fetch_timeout: Duration::from_secs(30),
            retention_days: 7,
            end_grace_minutes: 60,
            lock_backend: LockBackend::Auto,
            run_once: false,
            api_base_url: "https://api.guildwars2.com".to_string(),
            guild_lookup_limit: 30,
            guild_lookup_concurrency: 10,
            log_format: LogFormat::Pretty,
        }
    }
}

impl TrackerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to the [`Default`] values when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidConfig`] if `TRACKER_LOCK_BACKEND` or
    /// `LOG_FORMAT` is set to an unknown value, or if the loaded values
    /// fail [`TrackerConfig::validate`].
    pub fn from_env() -> Result<Self, TrackerError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let data_dir = std::env::var("TRACKER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let lock_backend = match std::env::var("TRACKER_LOCK_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.lock_backend,
        };
        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.log_format,
        };

        let poll_interval_secs = parse_env("TRACKER_POLL_INTERVAL_SECS", 15 * 60_u64);
        let fetch_timeout_secs = parse_env("TRACKER_FETCH_TIMEOUT_SECS", 30_u64);

        let config = Self {
            data_dir,
            world_id: parse_env("TRACKER_WORLD_ID", defaults.world_id),
            poll_interval: Duration::from_secs(poll_interval_secs),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            retention_days: parse_env("TRACKER_RETENTION_DAYS", defaults.retention_days),
            end_grace_minutes: parse_env("TRACKER_END_GRACE_MINUTES", defaults.end_grace_minutes),
            lock_backend,
            run_once: parse_env_bool("TRACKER_RUN_ONCE", defaults.run_once),
            api_base_url: std::env::var("GW2_API_BASE_URL").unwrap_or(defaults.api_base_url),
            guild_lookup_limit: parse_env("GW2_GUILD_LOOKUP_LIMIT", defaults.guild_lookup_limit),
            guild_lookup_concurrency: parse_env(
                "GW2_GUILD_LOOKUP_CONCURRENCY",
                defaults.guild_lookup_concurrency,
            )
            .max(1),
            log_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidConfig`] if the poll interval or
    /// fetch timeout is zero, or if the retention or end grace falls
    /// outside its supported range.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.poll_interval.is_zero() || self.fetch_timeout.is_zero() {
            return Err(TrackerError::InvalidConfig(
                "poll interval and fetch timeout must be positive".to_string(),
            ));
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.retention_days) {
            return Err(TrackerError::InvalidConfig(format!(
                "TRACKER_RETENTION_DAYS must be between 1 and {MAX_RETENTION_DAYS}, got {}",
                self.retention_days
            )));
        }
        if self.end_grace_minutes > MAX_END_GRACE_MINUTES {
            return Err(TrackerError::InvalidConfig(format!(
                "TRACKER_END_GRACE_MINUTES must be at most {MAX_END_GRACE_MINUTES}, got {}",
                self.end_grace_minutes
            )));
        }
        Ok(())
    }

    /// Retention window as a signed duration for timestamp arithmetic.
    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Stale margin past `end_time` as a signed duration.
    #[must_use]
    pub fn end_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.end_grace_minutes))
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key)
        .ok()
        .map(|v| v.to_ascii_lowercase())
        .as_deref()
    {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_matchup_cadence() {
        let config = TrackerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(900));
        assert_eq!(config.retention(), chrono::Duration::days(7));
        assert_eq!(config.end_grace(), chrono::Duration::minutes(60));
        assert_eq!(config.lock_backend, LockBackend::Auto);
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().ok(), Some(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>().ok(), Some(LogFormat::Pretty));
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_retention_is_rejected() {
        for retention_days in [0, MAX_RETENTION_DAYS + 1, u32::MAX] {
            let config = TrackerConfig {
                retention_days,
                ..TrackerConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(TrackerError::InvalidConfig(_))),
                "retention_days = {retention_days}"
            );
        }
        let config = TrackerConfig {
            end_grace_minutes: u32::MAX,
            ..TrackerConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrackerError::InvalidConfig(_))));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = TrackerConfig {
            poll_interval: Duration::ZERO,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: u32 = parse_env("WVW_TRACKER_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(value, 42);
        assert!(parse_env_bool("WVW_TRACKER_TEST_SURELY_UNSET_KEY", true));
    }
}
