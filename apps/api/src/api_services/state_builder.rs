use std::sync::Arc;
use std::time::Duration;

use council_application::{
    AuthorizationService, ReplayCache, ReplayCacheSweep, RoleService, RoleSettings, SweepJob,
    TokenAuthenticator, VoteService, VoteSettings,
};
use council_core::AppError;
use council_infrastructure::{
    BroadcastEventPublisher, HttpIdentityConfirmer, InMemoryReplayCache, RedisReplayCache,
    load_issuer_keys,
};
use tracing::info;

use crate::api_config::ApiConfig;
use crate::state::AppState;

use super::database::connect_and_migrate;
use super::redis::build_redis_client;

mod storage;

const REPLAY_KEY_PREFIX: &str = "council:jti";

/// Application state plus the background sweeps to schedule.
pub struct ApiServices {
    pub state: AppState,
    pub sweeps: Vec<(Arc<dyn SweepJob>, Duration)>,
}

pub async fn build_api_services(config: &ApiConfig) -> Result<ApiServices, AppError> {
    let issuer_keys = load_issuer_keys(&config.issuer_key_files)?;

    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;
    let postgres_pool = match config.database_url.as_deref() {
        Some(database_url) => Some(connect_and_migrate(database_url).await?),
        None => None,
    };

    let repositories = storage::build_storage(postgres_pool.clone());
    let replay_cache: Arc<dyn ReplayCache> = match redis_client.clone() {
        Some(client) => Arc::new(RedisReplayCache::new(client, REPLAY_KEY_PREFIX)),
        None => {
            info!("using in-memory replay cache");
            Arc::new(InMemoryReplayCache::new())
        }
    };

    let http_client = reqwest::Client::builder()
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build http client: {error}")))?;
    let identity_confirmer = Arc::new(HttpIdentityConfirmer::new(
        http_client,
        config.oauth_identity_url.clone(),
        config.oauth_timeout,
    ));
    let token_authenticator = Arc::new(TokenAuthenticator::new(
        Arc::new(issuer_keys),
        replay_cache.clone(),
        identity_confirmer,
    ));

    let event_publisher = BroadcastEventPublisher::new(config.event_channel_capacity)?;
    let authorization_service = AuthorizationService::new(repositories.authorization_repository);
    let role_service = RoleService::new(
        repositories.role_repository,
        authorization_service.clone(),
        Arc::new(event_publisher.clone()),
        RoleSettings {
            cascade_max_depth: config.cascade_max_depth,
        },
    );
    let vote_service = VoteService::new(
        repositories.vote_repository,
        authorization_service.clone(),
        Arc::new(event_publisher.clone()),
        VoteSettings {
            successor_min_duration: config.successor_min_duration,
        },
    );

    let sweeps: Vec<(Arc<dyn SweepJob>, Duration)> = vec![
        (
            Arc::new(ReplayCacheSweep::new(replay_cache)),
            config.replay_sweep_interval,
        ),
        (Arc::new(vote_service.clone()), config.vote_sweep_interval),
        (Arc::new(role_service.clone()), config.role_sweep_interval),
    ];

    Ok(ApiServices {
        state: AppState {
            token_authenticator,
            authorization_service,
            role_service,
            vote_service,
            event_publisher,
            postgres_pool,
            redis_client,
        },
        sweeps,
    })
}
