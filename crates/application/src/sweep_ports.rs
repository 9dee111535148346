use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_core::AppResult;

use crate::ReplayCache;

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Items handled successfully.
    pub processed: usize,
    /// Items whose handling failed and will be retried next pass.
    pub failed: usize,
}

/// A scheduled batch pass over time-based state.
#[async_trait]
pub trait SweepJob: Send + Sync {
    /// Stable job name used in logs.
    fn name(&self) -> &'static str;

    /// Runs one pass as of `now`.
    ///
    /// Per-item failures are counted in the report; an error means the pass
    /// could not start at all.
    async fn run_sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport>;
}

/// Evicts expired token ids from the replay cache.
#[derive(Clone)]
pub struct ReplayCacheSweep {
    cache: Arc<dyn ReplayCache>,
}

impl ReplayCacheSweep {
    /// Creates the sweep over a replay cache.
    #[must_use]
    pub fn new(cache: Arc<dyn ReplayCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl SweepJob for ReplayCacheSweep {
    fn name(&self) -> &'static str {
        "replay_cache_eviction"
    }

    async fn run_sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let evicted = self.cache.evict_expired(now).await?;
        Ok(SweepReport {
            processed: evicted,
            failed: 0,
        })
    }
}
