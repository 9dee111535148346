//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod role;
mod security;
mod vote;

pub use role::{
    BuiltinRole, MAX_ROLE_TIMEOUT_SECONDS, Role, RoleBinding, RoleChangeReason, RoleDraft, RoleId,
    RoleUpdateType,
};
pub use security::{Permission, PermissionSet};
pub use vote::{
    Position, Vote, VoteConclusion, VoteDraft, VoteId, VoteKind, VoteState, VoteStateDetail,
    VoteTally, VoterLists,
};
