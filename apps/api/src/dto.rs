//! Transport payloads of the HTTP API.

mod commands;
mod responses;

pub use commands::{GovernanceCommand, RoleDefinitionPayload, assign_role_input, vote_draft};
pub use responses::{
    CommandResponse, HealthDependencyStatus, HealthResponse, PermissionResponse,
    PermissionSetResponse, RoleBindingResponse, RoleResponse, VoteResponse,
};

#[cfg(test)]
mod tests;
