//! Post lifecycle rules.
//!
//! ```text
//! abierto ──commit──▶ en_proceso ──commit──▶ en_proceso
//!    │                    │
//!    └──────resolve───────┴──────▶ resuelto (terminal)
//! ```
//!
//! Deletion is not a transition: the owner may hard-delete from any state.
//! These functions only decide; the repository applies the outcome inside a
//! single transaction.

use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::{Post, PostStatus};

/// Status after a volunteer commits to help.
pub fn status_after_commitment(current: PostStatus) -> Result<PostStatus, AppError> {
    match current {
        PostStatus::Abierto | PostStatus::EnProceso => Ok(PostStatus::EnProceso),
        PostStatus::Resuelto => Err(AppError::Validation(
            "Post is already resolved".to_string(),
        )),
    }
}

/// Status after the post is marked resolved.
pub fn status_after_resolution(current: PostStatus) -> Result<PostStatus, AppError> {
    match current {
        PostStatus::Abierto | PostStatus::EnProceso => Ok(PostStatus::Resuelto),
        PostStatus::Resuelto => Err(AppError::Validation(
            "Post is already resolved".to_string(),
        )),
    }
}

/// Commitments must carry a note telling the requester what to expect.
pub fn validate_commitment_note(note: &str) -> Result<&str, AppError> {
    let note = note.trim();
    if note.is_empty() {
        return Err(AppError::Validation(
            "A note is required to commit assistance".to_string(),
        ));
    }
    Ok(note)
}

/// Only the creator may delete a post.
pub fn ensure_can_delete(post: &Post, actor: &Actor) -> Result<(), AppError> {
    if post.user_id != actor.uid {
        return Err(AppError::Permission(
            "Only the creator can delete this post".to_string(),
        ));
    }
    Ok(())
}

/// The creator or an admin may resolve a post.
pub fn ensure_can_resolve(post: &Post, actor: &Actor, is_admin: bool) -> Result<(), AppError> {
    if post.user_id != actor.uid && !is_admin {
        return Err(AppError::Permission(
            "Only the creator or an admin can resolve this post".to_string(),
        ));
    }
    Ok(())
}
