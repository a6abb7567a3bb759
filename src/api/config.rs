//! Shared configuration endpoints (admin only).

use axum::{extract::State, http::HeaderMap, Json};

use super::{error, require_admin, success, ApiResult};
use crate::errors::AppError;
use crate::models::{SheetConfig, UpdateSheetConfigRequest};
use crate::AppState;

/// GET /api/config - Read the stored sheet configuration.
pub async fn get_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<SheetConfig> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&state, &headers).await {
        return error(e, revision_id);
    }

    match state.repo.get_sheet_config().await {
        Ok(config) => success(config, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/config - Store the trusted published-sheet URL.
pub async fn update_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateSheetConfigRequest>,
) -> ApiResult<SheetConfig> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let admin = match require_admin(&state, &headers).await {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };
    let url = match request.validate() {
        Ok(url) => url,
        Err(message) => return error(AppError::Validation(message), revision_id),
    };

    let updated_by = admin.email.as_deref().unwrap_or(&admin.uid);
    match state.repo.set_sheet_config(url, updated_by).await {
        Ok(config) => {
            tracing::info!("Sheet URL updated by {}", updated_by);
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(config, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
