//! Tag API endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::models::Tag;
use crate::AppState;

/// GET /api/tags - List all tags, most used first.
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Vec<Tag>> {
    success(state.repo.list_tags().await?)
}
