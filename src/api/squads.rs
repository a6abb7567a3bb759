//! Squad API endpoints: listing and admin-triggered ingestion.

use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Json,
};

use super::{error, require_admin, success, ApiResult};
use crate::errors::{AppError, AppErrorWithRevision};
use crate::events::{ChangeEvent, ChangeKind, Collection};
use crate::ingest::{self, SheetSource};
use crate::models::{IngestionReport, Squad, SyncSquadsRequest, UpdateSheetConfigRequest};
use crate::AppState;

/// Largest accepted workbook upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Multipart field carrying the workbook.
const UPLOAD_FIELD: &str = "file";

/// GET /api/squads - List all squads.
pub async fn list_squads(State(state): State<AppState>) -> ApiResult<Vec<Squad>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_squads().await {
        Ok(squads) => success(squads, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/squads/:id - Get a single squad.
pub async fn get_squad(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Squad> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_squad(&id).await {
        Ok(Some(squad)) => success(squad, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Squad {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /public/squads - Plain squad array for the public map.
pub async fn list_public_squads(
    State(state): State<AppState>,
) -> Result<Json<Vec<Squad>>, AppErrorWithRevision> {
    state
        .repo
        .list_squads()
        .await
        .map(Json)
        .map_err(|error| AppErrorWithRevision {
            error,
            revision_id: 0,
        })
}

/// POST /api/squads/upload - Ingest an uploaded workbook or CSV file.
pub async fn upload_squads(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<IngestionReport> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let admin = match require_admin(&state, &headers).await {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };
    let bytes = match read_upload(multipart).await {
        Ok(bytes) => bytes,
        Err(e) => return error(e, revision_id),
    };

    tracing::info!("{} uploaded a {} byte squad sheet", admin.uid, bytes.len());
    run_ingestion(&state, SheetSource::Bytes(bytes), revision_id).await
}

/// POST /api/squads/sync - Ingest the published sheet.
///
/// Uses the URL in the body when given, the stored configuration otherwise.
pub async fn sync_squads(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Option<Json<SyncSquadsRequest>>,
) -> ApiResult<IngestionReport> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let admin = match require_admin(&state, &headers).await {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };

    let requested = request
        .and_then(|Json(r)| r.url)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    let url = match requested {
        Some(url) => url,
        None => match state.repo.get_sheet_config().await {
            Ok(config) => match config.sheets_csv_url {
                Some(url) => url,
                None => {
                    return error(
                        AppError::Validation("No sheet URL configured".to_string()),
                        revision_id,
                    )
                }
            },
            Err(e) => return error(e, revision_id),
        },
    };

    let check = UpdateSheetConfigRequest {
        sheets_csv_url: url,
    };
    let url = match check.validate() {
        Ok(url) => url.to_string(),
        Err(message) => return error(AppError::Validation(message), revision_id),
    };

    tracing::info!("{} triggered a sheet sync from {}", admin.uid, url);
    run_ingestion(&state, SheetSource::Url(url), revision_id).await
}

async fn run_ingestion(
    state: &AppState,
    source: SheetSource,
    revision_id: i64,
) -> ApiResult<IngestionReport> {
    match ingest::ingest(&state.repo, &state.http, source).await {
        Ok(report) => {
            state.events.publish(ChangeEvent::new(
                Collection::Squads,
                ChangeKind::Replaced,
                None,
            ));
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(report, new_revision)
        }
        Err(e) => {
            tracing::warn!("Squad ingestion failed: {}", e);
            error(e, revision_id)
        }
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        return Ok(bytes.to_vec());
    }

    Err(AppError::BadRequest(format!(
        "Multipart field '{}' is required",
        UPLOAD_FIELD
    )))
}
