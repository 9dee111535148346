use std::sync::Arc;

use council_application::{AuthorizationService, RoleService, TokenAuthenticator, VoteService};
use council_infrastructure::BroadcastEventPublisher;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub token_authenticator: Arc<TokenAuthenticator>,
    pub authorization_service: AuthorizationService,
    pub role_service: RoleService,
    pub vote_service: VoteService,
    pub event_publisher: BroadcastEventPublisher,
    pub postgres_pool: Option<sqlx::PgPool>,
    pub redis_client: Option<redis::Client>,
}
