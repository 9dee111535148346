use council_application::AssignRoleInput;
use council_core::{AppError, AppResult};
use council_domain::{
    Permission, PermissionSet, Position, RoleDraft, RoleId, VoteDraft, VoteId, VoteKind,
};
use serde::Deserialize;

/// Role definition carried by role commands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleDefinitionPayload {
    pub name: String,
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub unique: bool,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub cascade: bool,
}

impl From<RoleDefinitionPayload> for RoleDraft {
    fn from(value: RoleDefinitionPayload) -> Self {
        Self {
            name: value.name,
            permissions: value.permissions.into_iter().collect::<PermissionSet>(),
            unique: value.unique,
            timeout_seconds: value.timeout_seconds,
            cascade: value.cascade,
        }
    }
}

/// One mutating governance operation.
///
/// Decoded from `{ "operation": ..., "arguments": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", content = "arguments", rename_all = "snake_case")]
pub enum GovernanceCommand {
    CreateVote {
        name: String,
        #[serde(default)]
        description: String,
        kind: VoteKind,
        duration_seconds: i64,
        #[serde(default)]
        is_private: bool,
        #[serde(default)]
        has_abstain: bool,
    },
    CastPosition {
        vote_id: VoteId,
        position: Position,
    },
    Veto {
        vote_id: VoteId,
        reason: String,
    },
    SetPrivate {
        vote_id: VoteId,
    },
    AssignRole {
        user_id: String,
        role_id: RoleId,
        #[serde(default)]
        is_transferal: bool,
        #[serde(default)]
        issuer_role_id: Option<RoleId>,
    },
    RemoveRole {
        user_id: String,
        role_id: RoleId,
    },
    CreateRole(RoleDefinitionPayload),
    ValidateRole(RoleDefinitionPayload),
    ModifyRole {
        role_id: RoleId,
        #[serde(flatten)]
        definition: RoleDefinitionPayload,
    },
}

pub fn vote_draft(
    name: String,
    description: String,
    kind: VoteKind,
    duration_seconds: i64,
    is_private: bool,
    has_abstain: bool,
) -> AppResult<VoteDraft> {
    let duration = chrono::Duration::try_seconds(duration_seconds).ok_or_else(|| {
        AppError::Validation(format!("duration_seconds {duration_seconds} is out of range"))
    })?;

    Ok(VoteDraft {
        name,
        description,
        kind,
        duration,
        is_private,
        has_abstain,
    })
}

pub fn assign_role_input(
    user_id: String,
    role_id: RoleId,
    is_transferal: bool,
    issuer_role_id: Option<RoleId>,
) -> AssignRoleInput {
    AssignRoleInput {
        user_id,
        role_id,
        is_transferal,
        issuer_role_id,
    }
}
