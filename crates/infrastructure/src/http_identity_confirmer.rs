use std::time::Duration;

use async_trait::async_trait;
use council_application::IdentityConfirmer;
use council_core::{AppError, AppResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    id: String,
}

/// Confirms third-party identities against an OAuth "current user" endpoint.
///
/// Transport failures, timeouts and non-200 responses all surface as
/// `Unauthorized`.
#[derive(Clone)]
pub struct HttpIdentityConfirmer {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpIdentityConfirmer {
    /// Creates a confirmer for one identity endpoint.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl IdentityConfirmer for HttpIdentityConfirmer {
    async fn confirm(&self, oauth_token: &str) -> AppResult<String> {
        let response = self
            .http_client
            .get(self.endpoint.as_str())
            .bearer_auth(oauth_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| {
                AppError::Unauthorized(format!("identity confirmation request failed: {error}"))
            })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(AppError::Unauthorized(format!(
                "identity confirmation returned status {}",
                response.status()
            )));
        }

        let identity = response.json::<IdentityResponse>().await.map_err(|error| {
            AppError::Unauthorized(format!("identity confirmation body is invalid: {error}"))
        })?;

        Ok(identity.id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use council_application::IdentityConfirmer;
    use council_core::AppError;

    use super::HttpIdentityConfirmer;

    #[tokio::test]
    async fn unreachable_endpoint_is_unauthorized() {
        let confirmer = HttpIdentityConfirmer::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/users/@me",
            Duration::from_millis(500),
        );

        let result = confirmer.confirm("token").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
