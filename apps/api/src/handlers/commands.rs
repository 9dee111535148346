use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use council_core::Identity;
use council_domain::RoleDraft;

use crate::dto::{
    CommandResponse, GovernanceCommand, RoleBindingResponse, RoleResponse, VoteResponse,
    assign_role_input, vote_draft,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn command_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(command): Json<GovernanceCommand>,
) -> ApiResult<(StatusCode, Json<CommandResponse>)> {
    let response = match command {
        GovernanceCommand::CreateVote {
            name,
            description,
            kind,
            duration_seconds,
            is_private,
            has_abstain,
        } => {
            let draft = vote_draft(
                name,
                description,
                kind,
                duration_seconds,
                is_private,
                has_abstain,
            )?;
            let vote = state.vote_service.create_vote(&identity, draft).await?;
            return Ok((
                StatusCode::CREATED,
                Json(CommandResponse::Vote(VoteResponse::from(vote))),
            ));
        }
        GovernanceCommand::CastPosition { vote_id, position } => CommandResponse::Tally(
            state
                .vote_service
                .cast_position(&identity, vote_id, position)
                .await?,
        ),
        GovernanceCommand::Veto { vote_id, reason } => CommandResponse::Vote(VoteResponse::from(
            state.vote_service.veto(&identity, vote_id, reason).await?,
        )),
        GovernanceCommand::SetPrivate { vote_id } => CommandResponse::Vote(VoteResponse::from(
            state.vote_service.set_private(&identity, vote_id).await?,
        )),
        GovernanceCommand::AssignRole {
            user_id,
            role_id,
            is_transferal,
            issuer_role_id,
        } => {
            let input = assign_role_input(user_id, role_id, is_transferal, issuer_role_id);
            let binding = state.role_service.assign_role(&identity, input).await?;
            return Ok((
                StatusCode::CREATED,
                Json(CommandResponse::Binding(RoleBindingResponse::from(binding))),
            ));
        }
        GovernanceCommand::RemoveRole { user_id, role_id } => CommandResponse::Removed {
            removed: state
                .role_service
                .remove_role(&identity, &user_id, role_id)
                .await?,
        },
        GovernanceCommand::CreateRole(definition) => {
            let role = state
                .role_service
                .create_role(&identity, RoleDraft::from(definition))
                .await?;
            return Ok((
                StatusCode::CREATED,
                Json(CommandResponse::Role(RoleResponse::from(role))),
            ));
        }
        GovernanceCommand::ValidateRole(definition) => {
            state
                .role_service
                .validate_role(&identity, RoleDraft::from(definition))
                .await?;
            CommandResponse::Valid
        }
        GovernanceCommand::ModifyRole {
            role_id,
            definition,
        } => CommandResponse::Role(RoleResponse::from(
            state
                .role_service
                .modify_role(&identity, role_id, RoleDraft::from(definition))
                .await?,
        )),
    };

    Ok((StatusCode::OK, Json(response)))
}
