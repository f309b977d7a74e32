//! Comment API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{created, success, ApiResult};
use crate::auth::Actor;
use crate::models::{Comment, CommentNode, CreateCommentRequest, UpdateCommentRequest};
use crate::AppState;

/// GET /api/comments/post/:post_id - Comment threads of a post.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Vec<CommentNode>> {
    success(state.repo.list_comments(&post_id).await?)
}

/// POST /api/comments - Comment on a post or reply to a comment.
pub async fn create_comment(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateCommentRequest>,
) -> ApiResult<Comment> {
    created(state.repo.create_comment(&actor, &request).await?)
}

/// PUT /api/comments/:id - Edit a comment.
pub async fn update_comment(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdateCommentRequest>,
) -> ApiResult<Comment> {
    success(state.repo.update_comment(&id, &actor, &request.body).await?)
}

/// DELETE /api/comments/:id - Delete a comment.
pub async fn delete_comment(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.repo.delete_comment(&id, &actor).await?;
    success(())
}

/// POST /api/comments/:id/accept - Accept a comment as the answer.
pub async fn accept_comment(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<Comment> {
    success(state.repo.accept_comment(&id, &actor).await?)
}
