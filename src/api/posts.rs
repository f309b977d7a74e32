//! Post API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{created, success, ApiResult};
use crate::auth::Actor;
use crate::models::{
    CategoryCount, CreatePostRequest, LikeToggle, ListPostsQuery, Post, PostDetail, PostPage,
    UpdatePostRequest,
};
use crate::AppState;

/// GET /api/posts - List posts with optional category/tag filters.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<PostPage> {
    success(state.repo.list_posts(&query).await?)
}

/// POST /api/posts - Create a post.
pub async fn create_post(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<Post> {
    created(state.repo.create_post(&actor, &request).await?)
}

/// GET /api/posts/:id - Get a post with its comments. Counts a view.
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PostDetail> {
    success(state.repo.get_post(&id).await?)
}

/// PUT /api/posts/:id - Update a post.
pub async fn update_post(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdatePostRequest>,
) -> ApiResult<Post> {
    success(state.repo.update_post(&id, &actor, &request).await?)
}

/// DELETE /api/posts/:id - Delete a post.
pub async fn delete_post(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.repo.delete_post(&id, &actor).await?;
    success(())
}

/// POST /api/posts/:id/like - Toggle the actor's like.
pub async fn toggle_like(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<LikeToggle> {
    success(state.repo.toggle_like(&actor, &id).await?)
}

/// GET /api/categories - Categories with post counts.
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<CategoryCount>> {
    success(state.repo.list_categories().await?)
}
