use axum::Json;
use axum::extract::{Extension, Path, State};
use council_application::TallyView;
use council_core::Identity;
use council_domain::{Permission, RoleId, VoteId};

use crate::dto::{PermissionResponse, PermissionSetResponse, RoleResponse, VoteResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    state
        .authorization_service
        .require_info_access(&identity)
        .await?;

    Ok(Json(
        Permission::all()
            .iter()
            .copied()
            .map(PermissionResponse::from)
            .collect(),
    ))
}

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .role_service
        .list_roles(&identity)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn role_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(role_id): Path<RoleId>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state.role_service.find_role(&identity, role_id).await?;
    Ok(Json(RoleResponse::from(role)))
}

pub async fn role_permissions_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(role_id): Path<RoleId>,
) -> ApiResult<Json<PermissionSetResponse>> {
    let role = state.role_service.find_role(&identity, role_id).await?;
    Ok(Json(PermissionSetResponse::from(role.permissions())))
}

pub async fn user_permissions_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<PermissionSetResponse>> {
    let permissions = state
        .role_service
        .user_permissions(&identity, &user_id)
        .await?;
    Ok(Json(PermissionSetResponse::from(permissions)))
}

pub async fn user_roles_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .role_service
        .list_user_roles(&identity, &user_id)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn vote_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(vote_id): Path<VoteId>,
) -> ApiResult<Json<VoteResponse>> {
    let vote = state.vote_service.find_vote(&identity, vote_id).await?;
    Ok(Json(VoteResponse::from(vote)))
}

pub async fn tally_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(vote_id): Path<VoteId>,
) -> ApiResult<Json<TallyView>> {
    Ok(Json(state.vote_service.tally(&identity, vote_id).await?))
}
