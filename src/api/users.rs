//! User profile endpoints.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use super::{error, require_admin, success, ApiResult};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::{UpdateRoleRequest, UserProfile, UserRole};
use crate::AppState;

/// GET /api/users/me - Read the caller's profile.
pub async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<UserProfile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let actor = match Actor::require(&headers) {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };

    match state.repo.get_user(&actor.uid).await {
        Ok(Some(profile)) => success(profile, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("User {} not found", actor.uid)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/users/me - Create the caller's profile on first sign-in.
pub async fn ensure_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<UserProfile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let actor = match Actor::require(&headers) {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };
    let initial_role = if state.config.is_bootstrap_admin(&actor.uid) {
        UserRole::Admin
    } else {
        UserRole::User
    };

    match state.repo.ensure_user(&actor, initial_role).await {
        Ok(profile) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(profile, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/users/:uid/role - Change a user's role.
pub async fn update_user_role(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateRoleRequest>,
) -> ApiResult<UserProfile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let admin = match require_admin(&state, &headers).await {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };

    match state.repo.set_user_role(&uid, request.role).await {
        Ok(profile) => {
            tracing::info!(
                "{} set role of {} to {}",
                admin.uid,
                uid,
                request.role.as_str()
            );
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(profile, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
