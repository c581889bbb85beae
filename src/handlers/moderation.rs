// src/handlers/moderation.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::comment::ModerationDecision,
    services::CommentStore,
    utils::jwt::Claims,
};

/// Applies a review decision to a comment.
/// Admin only. The reviewer defaults to the calling admin.
pub async fn apply_decision(
    State(store): State<CommentStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(mut payload): Json<ModerationDecision>,
) -> Result<impl IntoResponse, AppError> {
    if payload.reviewer_id.is_none() {
        payload.reviewer_id = Some(claims.user_id()?);
    }

    let comment = store.apply_moderation_decision(id, payload).await?;
    Ok(Json(comment))
}

/// Recomputes the counters of a comment.
/// Admin only.
pub async fn resync_counters(
    State(store): State<CommentStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = store.resync(id).await?;
    Ok(Json(snapshot))
}
