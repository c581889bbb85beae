use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        comment::{CreateCommentRequest, PageParams, TargetRef, TargetType},
        relation::DescendantParams,
    },
    services::{CommentStore, TreeAssembler},
    utils::jwt::Claims,
};

/// Create a new comment or reply.
/// Requires: Login.
pub async fn create_comment(
    State(store): State<CommentStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let author_id = claims.user_id()?;
    let comment = store.create(author_id, payload).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Top-level comments of a target, newest first, with their first replies inlined.
/// Supports cursor-based pagination.
pub async fn list_thread(
    State(threads): State<TreeAssembler>,
    Path((target_type, target_id)): Path<(TargetType, i64)>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = threads
        .fetch_thread(TargetRef::new(target_type, target_id), &params)
        .await?;

    Ok(Json(page))
}

/// Direct replies of a comment, oldest first.
pub async fn list_replies(
    State(threads): State<TreeAssembler>,
    Path(id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = threads.fetch_replies(id, &params).await?;
    Ok(Json(page))
}

/// Get a single comment by ID.
pub async fn get_comment(
    State(store): State<CommentStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = store.get(id).await?;
    Ok(Json(comment))
}

pub async fn get_ancestors(
    State(threads): State<TreeAssembler>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(threads.ancestors(id).await?))
}

pub async fn get_descendants(
    State(threads): State<TreeAssembler>,
    Path(id): Path<i64>,
    Query(params): Query<DescendantParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(threads.descendants(id, params.max_depth).await?))
}

/// Delete a comment (Soft Delete).
/// Requires: Login + (Author OR owner of the commented content).
pub async fn delete_comment(
    State(store): State<CommentStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    store.delete(id, claims.user_id()?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Toggle Like on a comment.
pub async fn toggle_like(
    State(store): State<CommentStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = store.toggle_like(id, claims.user_id()?).await?;
    Ok(Json(outcome))
}

/// Remove a like; unliking twice is not an error.
pub async fn unlike(
    State(store): State<CommentStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = store.unlike(id, claims.user_id()?).await?;
    Ok(Json(outcome))
}
