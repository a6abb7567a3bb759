//! Post API endpoints.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use super::{actor_is_admin, error, success, ApiResult};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::events::{ChangeEvent, ChangeKind, Collection};
use crate::models::{CommitAssistanceRequest, CreatePostRequest, Post, ResolvePostRequest};
use crate::AppState;

/// GET /api/posts - List the feed, newest first.
pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Vec<Post>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_posts().await {
        Ok(posts) => success(posts, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/posts/:id - Get a single post.
pub async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Post> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_post(&id).await {
        Ok(Some(post)) => success(post, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Post {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/posts - Publish a need or an offer.
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<Post> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let actor = match Actor::require(&headers) {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };
    if request.title.trim().is_empty() {
        return error(
            AppError::Validation("Title is required".to_string()),
            revision_id,
        );
    }

    match state.repo.create_post(&request, &actor).await {
        Ok(post) => {
            state.events.publish(ChangeEvent::new(
                Collection::Posts,
                ChangeKind::Created,
                Some(post.id.clone()),
            ));
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(post, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/posts/:id - Delete a post (creator only).
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let actor = match Actor::require(&headers) {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };

    match state.repo.delete_post(&id, &actor).await {
        Ok(()) => {
            state.events.publish(ChangeEvent::new(
                Collection::Posts,
                ChangeKind::Deleted,
                Some(id),
            ));
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/posts/:id/commitments - Commit to help with a post.
pub async fn commit_assistance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CommitAssistanceRequest>,
) -> ApiResult<Post> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let actor = match Actor::require(&headers) {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };

    match state
        .repo
        .commit_assistance(&id, &actor, &request.note)
        .await
    {
        Ok(post) => {
            state.events.publish(ChangeEvent::new(
                Collection::Posts,
                ChangeKind::Updated,
                Some(id),
            ));
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(post, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/posts/:id/resolve - Mark a post resolved (creator or admin).
pub async fn resolve_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Option<Json<ResolvePostRequest>>,
) -> ApiResult<Post> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let actor = match Actor::require(&headers) {
        Ok(actor) => actor,
        Err(e) => return error(e, revision_id),
    };
    let is_admin = match actor_is_admin(&state, &actor).await {
        Ok(is_admin) => is_admin,
        Err(e) => return error(e, revision_id),
    };
    let Json(request) = request.unwrap_or_default();

    match state
        .repo
        .resolve_post(&id, &actor, is_admin, request.note.as_deref())
        .await
    {
        Ok(post) => {
            state.events.publish(ChangeEvent::new(
                Collection::Posts,
                ChangeKind::Updated,
                Some(id),
            ));
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(post, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
