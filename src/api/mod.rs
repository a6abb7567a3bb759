//! REST API module.
//!
//! Contains all API routes and handlers following the web client contract.

mod config;
mod posts;
mod squads;
mod stream;
mod users;

pub use config::*;
pub use posts::*;
pub use squads::*;
pub use stream::*;
pub use users::*;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::Actor;
use crate::errors::AppError;
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: crate::errors::AppError, revision_id: i64) -> ApiResult<T> {
    Err(crate::errors::AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Whether the actor may perform admin operations.
///
/// Bootstrap admins from the environment pass even before their profile exists.
pub async fn actor_is_admin(state: &AppState, actor: &Actor) -> Result<bool, AppError> {
    if state.config.is_bootstrap_admin(&actor.uid) {
        return Ok(true);
    }
    state.repo.is_admin(&actor.uid).await
}

/// Identify the actor and require the admin role.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Actor, AppError> {
    let actor = Actor::require(headers)?;
    if !actor_is_admin(state, &actor).await? {
        tracing::warn!("Admin operation denied for {}", actor.uid);
        return Err(AppError::Permission("Admin role required".to_string()));
    }
    Ok(actor)
}
