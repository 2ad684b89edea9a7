//! HTTP client for the public GW2 API v2.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use super::MatchSource;
use super::models::{GuildIdentity, RawMatch, RawWorld, build_snapshot};
use crate::config::TrackerConfig;
use crate::domain::MatchSnapshot;
use crate::error::TrackerError;

/// World names change rarely; refresh them hourly.
const WORLD_NAMES_TTL: Duration = Duration::from_secs(3600);

/// [`MatchSource`] backed by `api.guildwars2.com`.
///
/// World names and guild identities are cached in memory. A failed guild
/// lookup is not cached, so it is retried on the next fetch.
#[derive(Debug)]
pub struct Gw2Client {
    http: reqwest::Client,
    base_url: String,
    guild_lookup_limit: usize,
    guild_lookup_concurrency: usize,
    world_names: RwLock<Option<(Instant, HashMap<u32, String>)>>,
    guilds: RwLock<HashMap<String, GuildIdentity>>,
}

impl Gw2Client {
    /// Builds a client from the tracker configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Fetch`] if the HTTP client cannot be built.
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(concat!("wvw-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            guild_lookup_limit: config.guild_lookup_limit,
            guild_lookup_concurrency: config.guild_lookup_concurrency.max(1),
            world_names: RwLock::new(None),
            guilds: RwLock::new(HashMap::new()),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TrackerError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::UpstreamStatus {
                status: status.as_u16(),
                endpoint: path.to_string(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// Fetches the match for `world_id`, falling back to scanning all
    /// matches when the per-world query fails.
    async fn fetch_raw_match(&self, world_id: u32) -> Result<RawMatch, TrackerError> {
        let primary = self
            .get_json::<RawMatch>(&format!("/v2/wvw/matches?world={world_id}"))
            .await;
        let primary_err = match primary {
            Ok(raw) => return Ok(raw),
            Err(e) => e,
        };
        tracing::warn!(
            world_id,
            error = %primary_err,
            "per-world match query failed; scanning all matches"
        );

        match self.get_json::<Vec<RawMatch>>("/v2/wvw/matches?ids=all").await {
            Ok(all) => all
                .into_iter()
                .find(|m| m.involves_world(world_id))
                .ok_or(primary_err),
            Err(e) => {
                tracing::debug!(world_id, error = %e, "fallback match scan failed");
                Err(primary_err)
            }
        }
    }

    async fn world_names(&self) -> HashMap<u32, String> {
        if let Some((fetched_at, names)) = self.world_names.read().await.as_ref()
            && fetched_at.elapsed() < WORLD_NAMES_TTL
        {
            return names.clone();
        }
        match self.get_json::<Vec<RawWorld>>("/v2/worlds?ids=all").await {
            Ok(worlds) => {
                let names: HashMap<u32, String> =
                    worlds.into_iter().map(|w| (w.id, w.name)).collect();
                *self.world_names.write().await = Some((Instant::now(), names.clone()));
                names
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "world name lookup failed; using stale or placeholder names"
                );
                self.world_names
                    .read()
                    .await
                    .as_ref()
                    .map(|(_, names)| names.clone())
                    .unwrap_or_default()
            }
        }
    }

    /// Resolves up to `guild_lookup_limit` identities, serving cached ones
    /// first. Unresolvable guilds are simply absent from the result.
    async fn guild_identities(&self, ids: Vec<String>) -> HashMap<String, GuildIdentity> {
        let mut resolved = HashMap::new();
        let mut missing = Vec::new();
        {
            let cache = self.guilds.read().await;
            for id in ids {
                match cache.get(&id) {
                    Some(identity) => {
                        resolved.insert(id, identity.clone());
                    }
                    None => missing.push(id),
                }
            }
        }
        missing.truncate(self.guild_lookup_limit);
        if missing.is_empty() {
            return resolved;
        }

        let fetched: Vec<(String, Result<GuildIdentity, TrackerError>)> = stream::iter(missing)
            .map(|id| async move {
                let result = self.get_json::<GuildIdentity>(&format!("/v2/guild/{id}")).await;
                (id, result)
            })
            .buffer_unordered(self.guild_lookup_concurrency)
            .collect()
            .await;

        let mut cache = self.guilds.write().await;
        let mut failed = 0_usize;
        for (id, result) in fetched {
            match result {
                Ok(identity) => {
                    cache.insert(id.clone(), identity.clone());
                    resolved.insert(id, identity);
                }
                Err(e) => {
                    failed += 1;
                    tracing::debug!(guild_id = %id, error = %e, "guild lookup failed");
                }
            }
        }
        if failed > 0 {
            tracing::warn!(failed, "some guild identities could not be resolved");
        }
        resolved
    }
}

impl MatchSource for Gw2Client {
    fn fetch_current_match(
        &self,
        world_id: u32,
    ) -> BoxFuture<'_, Result<MatchSnapshot, TrackerError>> {
        Box::pin(async move {
            let raw = self.fetch_raw_match(world_id).await?;
            let world_names = self.world_names().await;
            let guilds = self.guild_identities(raw.claiming_guilds()).await;
            tracing::debug!(
                world_id,
                match_id = %raw.id,
                guilds_resolved = guilds.len(),
                "match fetched"
            );
            Ok(build_snapshot(raw, &world_names, &guilds))
        })
    }
}
