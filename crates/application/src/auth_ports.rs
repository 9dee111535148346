use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_core::AppResult;
use council_domain::PermissionSet;

/// Repository port for permission lookups.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Lists the permission sets of every role currently bound to a subject.
    async fn list_role_permissions_for_subject(&self, subject: &str)
    -> AppResult<Vec<PermissionSet>>;
}

/// Shared store of already-used token ids.
///
/// Implementations must make `record_once` atomic with respect to concurrent
/// callers and to `evict_expired`.
#[async_trait]
pub trait ReplayCache: Send + Sync {
    /// Records `jti` until `expires_at`.
    ///
    /// Returns `false` when the id is already recorded with an expiry that
    /// has not passed at `now`.
    async fn record_once(
        &self,
        jti: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Drops every entry whose recorded expiry is before `now`.
    async fn evict_expired(&self, now: DateTime<Utc>) -> AppResult<usize>;
}

/// External identity confirmation for third-party issuers.
#[async_trait]
pub trait IdentityConfirmer: Send + Sync {
    /// Resolves the third-party user id behind an OAuth access token.
    async fn confirm(&self, oauth_token: &str) -> AppResult<String>;
}
