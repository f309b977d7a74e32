//! Database repository shared by every store.
//!
//! The per-entity operations live in sibling modules as further
//! `impl Repository` blocks; this file holds the handle and row decoding.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{Comment, Post, Role, Tag, User, UserSummary};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Columns selected for a post joined with its author. Tags are loaded separately.
pub(super) const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.body, p.category, p.published, p.view_count, p.like_count,
           p.is_pinned, p.is_locked, p.created_at, p.updated_at,
           u.id AS author_id, u.name AS author_name, u.reputation AS author_reputation
    FROM posts p JOIN users u ON u.id = p.author_id"#;

/// Columns selected for a comment joined with its author.
pub(super) const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.body, c.post_id, c.parent_id, c.like_count, c.is_accepted, c.is_edited,
           c.created_at, c.updated_at, c.deleted_at,
           u.id AS author_id, u.name AS author_name, u.reputation AS author_reputation
    FROM comments c JOIN users u ON u.id = c.author_id"#;

pub(super) const USER_SELECT: &str =
    "SELECT id, name, email, role, reputation, last_seen, created_at FROM users";

pub(super) const TAG_SELECT: &str = "SELECT t.id, t.name, t.slug, t.usage_count FROM tags t";

// Helper functions for row conversion

fn author_from_row(row: &SqliteRow) -> UserSummary {
    UserSummary {
        id: row.get("author_id"),
        name: row.get("author_name"),
        reputation: row.get("author_reputation"),
    }
}

pub(super) fn user_from_row(row: &SqliteRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role: Role::parse(&role),
        reputation: row.get("reputation"),
        last_seen: row.get("last_seen"),
        created_at: row.get("created_at"),
    }
}

pub(super) fn tag_from_row(row: &SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        usage_count: row.get("usage_count"),
    }
}

/// Decode a post row; `tags` is filled in by the caller.
pub(super) fn post_from_row(row: &SqliteRow) -> Post {
    let published: i32 = row.get("published");
    let is_pinned: i32 = row.get("is_pinned");
    let is_locked: i32 = row.get("is_locked");
    Post {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        author: author_from_row(row),
        category: row.get("category"),
        tags: Vec::new(),
        published: published != 0,
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        is_pinned: is_pinned != 0,
        is_locked: is_locked != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) fn comment_from_row(row: &SqliteRow) -> Comment {
    let is_accepted: i32 = row.get("is_accepted");
    let is_edited: i32 = row.get("is_edited");
    Comment {
        id: row.get("id"),
        body: row.get("body"),
        author: author_from_row(row),
        post_id: row.get("post_id"),
        parent_id: row.get("parent_id"),
        like_count: row.get("like_count"),
        is_accepted: is_accepted != 0,
        is_edited: is_edited != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}
