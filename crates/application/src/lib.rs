//! Application services and ports.

#![forbid(unsafe_code)]

mod auth_ports;
mod authorization_service;
mod governance_events;
mod role_ports;
mod role_service;
mod sweep_ports;
mod token_authenticator;
mod vote_ports;
mod vote_service;

pub use auth_ports::{AuthorizationRepository, IdentityConfirmer, ReplayCache};
pub use authorization_service::AuthorizationService;
pub use governance_events::{EventPublisher, GovernanceEvent, RoleUpdate, TallyView};
pub use role_ports::{RoleRepository, RoleTransaction};
pub use role_service::{AssignRoleInput, RoleService, RoleSettings};
pub use sweep_ports::{ReplayCacheSweep, SweepJob, SweepReport};
pub use token_authenticator::{AuthError, IssuerKey, IssuerKeyRegistry, TokenAuthenticator};
pub use vote_ports::{PositionRecord, VoteRepository, VoteTransaction};
pub use vote_service::{VoteService, VoteSettings};
