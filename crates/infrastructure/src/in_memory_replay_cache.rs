use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_application::ReplayCache;
use council_core::AppResult;
use tokio::sync::Mutex;

/// Process-local replay cache keyed by token id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReplayCache {
    entries: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryReplayCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded token ids, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no token id is recorded.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl ReplayCache for InMemoryReplayCache {
    async fn record_once(
        &self,
        jti: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut entries = self.entries.lock().await;
        if entries.get(jti).is_some_and(|recorded| *recorded >= now) {
            return Ok(false);
        }

        entries.insert(jti.to_owned(), expires_at);
        Ok(true)
    }

    async fn evict_expired(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at >= now);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use council_application::ReplayCache;

    use super::InMemoryReplayCache;

    #[tokio::test]
    async fn second_use_before_expiry_is_rejected() {
        let cache = InMemoryReplayCache::new();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap_or_else(|| unreachable!());
        let expires_at = now + Duration::minutes(5);

        assert_eq!(cache.record_once("jti-1", expires_at, now).await.ok(), Some(true));
        assert_eq!(
            cache
                .record_once("jti-1", expires_at, now + Duration::minutes(1))
                .await
                .ok(),
            Some(false)
        );
        assert_eq!(cache.record_once("jti-2", expires_at, now).await.ok(), Some(true));
    }

    #[tokio::test]
    async fn eviction_drops_only_expired_entries_and_frees_the_id() {
        let cache = InMemoryReplayCache::new();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap_or_else(|| unreachable!());

        assert!(cache.record_once("old", now + Duration::seconds(10), now).await.is_ok());
        assert!(cache.record_once("new", now + Duration::hours(1), now).await.is_ok());

        let later = now + Duration::minutes(1);
        assert_eq!(cache.evict_expired(later).await.ok(), Some(1));
        assert_eq!(cache.len().await, 1);
        assert_eq!(
            cache
                .record_once("old", later + Duration::minutes(5), later)
                .await
                .ok(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn stale_entry_is_overwritten_without_a_sweep() {
        let cache = InMemoryReplayCache::new();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap_or_else(|| unreachable!());

        assert!(cache.record_once("jti", now + Duration::seconds(1), now).await.is_ok());
        let later = now + Duration::seconds(30);
        assert_eq!(
            cache
                .record_once("jti", later + Duration::seconds(60), later)
                .await
                .ok(),
            Some(true)
        );
        assert!(!cache.is_empty().await);
    }
}
