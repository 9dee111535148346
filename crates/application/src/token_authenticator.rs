//! Bearer token authentication with multi-issuer keys and replay protection.

mod issuer_keys;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use council_core::auth::GOV_BOT_ISSUER;
use council_core::{AppError, Identity, IssuerTag};
use jsonwebtoken::Validation;
use jsonwebtoken::errors::ErrorKind;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::{IdentityConfirmer, ReplayCache};

pub use issuer_keys::{IssuerKey, IssuerKeyRegistry};

/// Reasons a bearer credential is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing bearer prefix or failed identity confirmation.
    #[error("unauthorized")]
    Unauthorized,
    /// The `exp` claim has passed.
    #[error("token expired")]
    TokenExpired,
    /// The token id was already used.
    #[error("token replayed")]
    Replay,
    /// The confirmed third-party id differs from the subject.
    #[error("issuer identity mismatch")]
    IssuerMismatch,
    /// Unknown issuer or bad signature.
    #[error("invalid token")]
    InvalidToken,
    /// Missing subject.
    #[error("invalid subject")]
    InvalidSubject,
    /// Unparseable token or missing required claim.
    #[error("malformed token")]
    Malformed,
    /// A third-party token lacks the embedded OAuth token.
    #[error("missing oauth token")]
    MissingOAuth,
    /// The replay cache backend failed.
    #[error("authentication backend failure: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns a stable label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::TokenExpired => "token_expired",
            Self::Replay => "replay",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::InvalidToken => "invalid_token",
            Self::InvalidSubject => "invalid_subject",
            Self::Malformed => "malformed",
            Self::MissingOAuth => "missing_oauth",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Internal(message) => AppError::Internal(message),
            _ => AppError::Unauthorized("authentication failed".to_owned()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeclaredIssuer {
    iss: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: Option<String>,
    exp: Option<i64>,
    jti: Option<String>,
    oauth_token: Option<String>,
}

/// Verifies bearer credentials and resolves the calling identity.
#[derive(Clone)]
pub struct TokenAuthenticator {
    issuers: Arc<IssuerKeyRegistry>,
    replay_cache: Arc<dyn ReplayCache>,
    identity_confirmer: Arc<dyn IdentityConfirmer>,
}

impl TokenAuthenticator {
    /// Creates an authenticator over the given collaborators.
    #[must_use]
    pub fn new(
        issuers: Arc<IssuerKeyRegistry>,
        replay_cache: Arc<dyn ReplayCache>,
        identity_confirmer: Arc<dyn IdentityConfirmer>,
    ) -> Self {
        Self {
            issuers,
            replay_cache,
            identity_confirmer,
        }
    }

    /// Authenticates an `Authorization` header value.
    pub async fn authenticate(&self, header: &str) -> Result<Identity, AuthError> {
        self.authenticate_at(header, Utc::now()).await
    }

    /// Authenticates an `Authorization` header value as of `now`.
    pub async fn authenticate_at(
        &self,
        header: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthError> {
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Unauthorized)?;

        let issuer = declared_issuer(token)?;
        let key = self.issuers.find(&issuer).ok_or(AuthError::InvalidToken)?;

        let mut validation = Validation::new(key.algorithm());
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.set_issuer(&[issuer.as_str()]);

        let claims = jsonwebtoken::decode::<TokenClaims>(token, key.decoding_key(), &validation)
            .map_err(|error| match error.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_)
                | ErrorKind::MissingRequiredClaim(_) => AuthError::Malformed,
                _ => AuthError::InvalidToken,
            })?
            .claims;

        let expires_at = claims
            .exp
            .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
            .ok_or(AuthError::Malformed)?;
        if expires_at < now {
            return Err(AuthError::TokenExpired);
        }

        let jti = claims
            .jti
            .as_deref()
            .filter(|jti| !jti.is_empty())
            .ok_or(AuthError::Malformed)?;
        let fresh = self
            .replay_cache
            .record_once(jti, expires_at, now)
            .await
            .map_err(|error| AuthError::Internal(error.to_string()))?;
        if !fresh {
            return Err(AuthError::Replay);
        }

        let subject = claims
            .sub
            .filter(|subject| !subject.trim().is_empty())
            .ok_or(AuthError::InvalidSubject)?;

        if issuer == GOV_BOT_ISSUER {
            return Ok(Identity::new(subject, IssuerTag::GovBot));
        }

        let oauth_token = claims
            .oauth_token
            .filter(|oauth_token| !oauth_token.is_empty())
            .ok_or(AuthError::MissingOAuth)?;

        let confirmed_id = self
            .identity_confirmer
            .confirm(&oauth_token)
            .await
            .map_err(|error| {
                warn!(issuer = %issuer, error = %error, "identity confirmation failed");
                AuthError::Unauthorized
            })?;

        if confirmed_id != subject {
            return Err(AuthError::IssuerMismatch);
        }

        Ok(Identity::new(subject, IssuerTag::Foreign))
    }
}

fn declared_issuer(token: &str) -> Result<String, AuthError> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::Malformed);
    };

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::Malformed)?;
    let declared: DeclaredIssuer =
        serde_json::from_slice(&payload).map_err(|_| AuthError::Malformed)?;

    declared
        .iss
        .filter(|issuer| !issuer.is_empty())
        .ok_or(AuthError::Malformed)
}
