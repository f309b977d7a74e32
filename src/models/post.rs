//! Post model, listing parameters and the like toggle result.

use serde::{Deserialize, Serialize};

use super::{CommentNode, Tag, UserSummary};

/// Largest page a listing may request.
pub const MAX_PAGE_LIMIT: i64 = 100;
const DEFAULT_PAGE_LIMIT: i64 = 10;

/// A forum post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: UserSummary,
    pub category: String,
    /// Tags in attachment order.
    pub tags: Vec<Tag>,
    pub published: bool,
    pub view_count: i64,
    /// Always equals the number of like rows for this post.
    pub like_count: i64,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A post together with its comment threads, as returned by a single read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<CommentNode>,
}

/// Request body for creating a post.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "content")]
    pub body: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for a partial post update.
///
/// Empty strings mean "unchanged". An absent or empty `tags` list also leaves
/// the tags unchanged; only a non-empty list replaces them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "content")]
    pub body: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Listing order for posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    Newest,
    Oldest,
    /// Most viewed first.
    Popular,
    /// Most liked first.
    Trending,
}

impl PostSort {
    pub fn order_by(&self) -> &'static str {
        match self {
            PostSort::Newest => "p.created_at DESC, p.rowid DESC",
            PostSort::Oldest => "p.created_at ASC, p.rowid ASC",
            PostSort::Popular => "p.view_count DESC, p.created_at DESC, p.rowid DESC",
            PostSort::Trending => "p.like_count DESC, p.created_at DESC, p.rowid DESC",
        }
    }
}

/// Query string for `GET /api/posts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default)]
    pub category: Option<String>,
    /// Tag name or slug; matched on the canonical slug.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub sort: PostSort,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl ListPostsQuery {
    /// Page number, 1-based.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// One page of posts. `total` counts every match of the filter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Number of live posts in a category.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    pub post_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LikeStatus {
    Liked,
    Unliked,
}

/// Outcome of toggling a like.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub status: LikeStatus,
    pub like_count: i64,
}
