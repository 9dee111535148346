use chrono::{DateTime, Utc};
use council_application::TallyView;
use council_domain::{
    Permission, PermissionSet, Role, RoleBinding, RoleId, Vote, VoteId, VoteKind, VoteState,
    VoteStateDetail,
};
use serde::Serialize;

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
    pub redis: HealthDependencyStatus,
}

/// Status of one backing service.
#[derive(Debug, Serialize)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One entry of the permission vocabulary.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PermissionResponse {
    pub name: &'static str,
    pub bit: u64,
}

impl From<Permission> for PermissionResponse {
    fn from(value: Permission) -> Self {
        Self {
            name: value.as_str(),
            bit: value.bit(),
        }
    }
}

/// A permission set with its raw bits.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PermissionSetResponse {
    pub bits: u64,
    pub permissions: Vec<&'static str>,
}

impl From<PermissionSet> for PermissionSetResponse {
    fn from(value: PermissionSet) -> Self {
        Self {
            bits: value.bits(),
            permissions: value
                .permissions()
                .into_iter()
                .map(|permission| permission.as_str())
                .collect(),
        }
    }
}

/// API representation of a role.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role_id: RoleId,
    pub name: String,
    pub permissions: PermissionSetResponse,
    pub unique: bool,
    pub timeout_seconds: u64,
    pub cascade: bool,
    pub builtin: bool,
}

impl From<Role> for RoleResponse {
    fn from(value: Role) -> Self {
        Self {
            role_id: value.id(),
            name: value.name().as_str().to_owned(),
            permissions: PermissionSetResponse::from(value.permissions()),
            unique: value.unique(),
            timeout_seconds: value.timeout_seconds(),
            cascade: value.cascade(),
            builtin: value.is_builtin(),
        }
    }
}

/// API representation of a role binding.
#[derive(Debug, Serialize)]
pub struct RoleBindingResponse {
    pub user_id: String,
    pub role_id: RoleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_role_id: Option<RoleId>,
    pub issued_at: DateTime<Utc>,
}

impl From<RoleBinding> for RoleBindingResponse {
    fn from(value: RoleBinding) -> Self {
        Self {
            user_id: value.user_id,
            role_id: value.role_id,
            issuer_id: value.issuer_id,
            issuer_role_id: value.issuer_role_id,
            issued_at: value.issued_at,
        }
    }
}

/// API representation of a vote.
#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub vote_id: VoteId,
    pub name: String,
    pub description: String,
    pub kind: VoteKind,
    pub state: VoteState,
    pub is_private: bool,
    pub has_abstain: bool,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<VoteStateDetail>,
}

impl From<Vote> for VoteResponse {
    fn from(value: Vote) -> Self {
        Self {
            vote_id: value.id(),
            name: value.name().as_str().to_owned(),
            description: value.description().to_owned(),
            kind: value.kind(),
            state: value.state(),
            is_private: value.is_private(),
            has_abstain: value.has_abstain(),
            created_at: value.created_at(),
            deadline: value.deadline(),
            detail: value.detail().cloned(),
        }
    }
}

/// Result of one governance command.
#[derive(Debug, Serialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum CommandResponse {
    Vote(VoteResponse),
    Tally(TallyView),
    Role(RoleResponse),
    Binding(RoleBindingResponse),
    Removed { removed: usize },
    Valid,
}
