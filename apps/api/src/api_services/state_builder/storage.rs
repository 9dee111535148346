use std::sync::Arc;

use council_application::{AuthorizationRepository, RoleRepository, VoteRepository};
use council_infrastructure::{
    InMemoryRoleRepository, InMemoryVoteRepository, PostgresRoleRepository,
    PostgresVoteRepository,
};
use sqlx::PgPool;
use tracing::info;

pub(super) struct RepositorySet {
    pub(super) authorization_repository: Arc<dyn AuthorizationRepository>,
    pub(super) role_repository: Arc<dyn RoleRepository>,
    pub(super) vote_repository: Arc<dyn VoteRepository>,
}

pub(super) fn build_storage(pool: Option<PgPool>) -> RepositorySet {
    match pool {
        Some(pool) => {
            let roles = Arc::new(PostgresRoleRepository::new(pool.clone()));
            RepositorySet {
                authorization_repository: roles.clone(),
                role_repository: roles,
                vote_repository: Arc::new(PostgresVoteRepository::new(pool)),
            }
        }
        None => {
            info!("DATABASE_URL not set, using in-memory storage");
            let roles = Arc::new(InMemoryRoleRepository::new());
            RepositorySet {
                authorization_repository: roles.clone(),
                role_repository: roles,
                vote_repository: Arc::new(InMemoryVoteRepository::new()),
            }
        }
    }
}
