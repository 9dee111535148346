//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod broadcast_event_publisher;
mod http_identity_confirmer;
mod in_memory_replay_cache;
mod in_memory_role_repository;
mod in_memory_vote_repository;
mod issuer_key_files;
mod postgres_role_repository;
mod postgres_vote_repository;
mod redis_replay_cache;
mod sweep_scheduler;

pub use broadcast_event_publisher::BroadcastEventPublisher;
pub use http_identity_confirmer::HttpIdentityConfirmer;
pub use in_memory_replay_cache::InMemoryReplayCache;
pub use in_memory_role_repository::InMemoryRoleRepository;
pub use in_memory_vote_repository::InMemoryVoteRepository;
pub use issuer_key_files::{IssuerKeyFile, load_issuer_keys};
pub use postgres_role_repository::PostgresRoleRepository;
pub use postgres_vote_repository::PostgresVoteRepository;
pub use redis_replay_cache::RedisReplayCache;
pub use sweep_scheduler::spawn_sweep;
