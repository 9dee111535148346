use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use council_core::AppError;
use tracing::warn;

use crate::error::ApiResult;
use crate::state::AppState;

/// Resolves the bearer credential into an `Identity` request extension.
///
/// The failure kind is logged; callers only ever see a generic 401.
pub async fn require_bearer_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let identity = state
        .token_authenticator
        .authenticate(&header_value)
        .await
        .map_err(|error| {
            warn!(kind = error.kind(), error = %error, "authentication rejected");
            AppError::from(error)
        })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
