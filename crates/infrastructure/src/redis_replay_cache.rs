//! Redis-backed replay cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_application::ReplayCache;
use council_core::{AppError, AppResult};

/// Redis implementation of the replay cache port.
///
/// Each token id is stored with `SET NX EXAT`, so Redis expires entries on its
/// own and concurrent API instances share one replay window.
#[derive(Clone)]
pub struct RedisReplayCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisReplayCache {
    /// Creates a cache with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, jti: &str) -> String {
        format!("{}:{jti}", self.key_prefix)
    }
}

/// Builds the `SET NX EXAT` command that claims a token id until it expires.
fn record_command(key: &str, expires_at: DateTime<Utc>) -> redis::Cmd {
    let mut command = redis::cmd("SET");
    command
        .arg(key)
        .arg(expires_at.timestamp())
        .arg("NX")
        .arg("EXAT")
        .arg(expires_at.timestamp());
    command
}

#[async_trait]
impl ReplayCache for RedisReplayCache {
    async fn record_once(
        &self,
        jti: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        // An already expired token cannot be replayed inside its window.
        if expires_at < now {
            return Ok(true);
        }

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let stored: Option<String> = record_command(&self.key_for(jti), expires_at)
            .query_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to record token id in redis: {error}"))
            })?;

        Ok(stored.is_some())
    }

    async fn evict_expired(&self, _now: DateTime<Utc>) -> AppResult<usize> {
        // Redis expires keys through EXAT.
        Ok(0)
    }
}
