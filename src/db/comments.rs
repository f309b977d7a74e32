//! Comment tree manager: threaded comments, edits, removal and acceptance.

use sqlx::{Row, SqliteConnection};

use super::reputation::{self, ReputationEvent};
use super::repository::{comment_from_row, COMMENT_SELECT};
use super::users::touch_last_seen;
use super::{now_timestamp, Repository};
use crate::errors::AppError;
use crate::models::{build_comment_tree, Comment, CommentNode, CreateCommentRequest};

impl Repository {
    /// Comment threads of a live post: top level newest first, replies oldest
    /// first beneath each comment.
    pub async fn list_comments(&self, post_id: &str) -> Result<Vec<CommentNode>, AppError> {
        self.ensure_live_post(post_id).await?;

        let rows = sqlx::query(&format!(
            "{COMMENT_SELECT} WHERE c.post_id = ? ORDER BY c.created_at ASC, c.rowid ASC"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        let comments: Vec<Comment> = rows.iter().map(comment_from_row).collect();
        Ok(build_comment_tree(comments))
    }

    /// Load a live comment.
    pub async fn find_comment(&self, id: &str) -> Result<Option<Comment>, AppError> {
        let row = sqlx::query(&format!(
            "{COMMENT_SELECT} WHERE c.id = ? AND c.deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    async fn require_comment(&self, id: &str) -> Result<Comment, AppError> {
        self.find_comment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))
    }

    /// Write a comment, optionally replying to another comment on the same
    /// post. The author earns reputation in the same transaction.
    pub async fn create_comment(
        &self,
        author_id: &str,
        request: &CreateCommentRequest,
    ) -> Result<Comment, AppError> {
        let body = request.body.trim();
        if body.is_empty() {
            return Err(AppError::Validation("Comment body is required".to_string()));
        }
        if request.post_id.trim().is_empty() {
            return Err(AppError::Validation("Post ID is required".to_string()));
        }

        self.get_user(author_id).await?;
        self.ensure_live_post(&request.post_id).await?;

        if let Some(parent_id) = &request.parent_id {
            let parent = self.require_comment(parent_id).await?;
            if parent.post_id != request.post_id {
                return Err(AppError::Validation(format!(
                    "Parent comment {} belongs to a different post",
                    parent_id
                )));
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        let mut tx = self.pool.begin().await?;

        insert_live_comment(&mut tx, &id, author_id, body, request, &now).await?;

        reputation::record(&mut tx, author_id, ReputationEvent::CommentCreated).await?;
        touch_last_seen(&mut tx, author_id, &now).await?;

        tx.commit().await?;

        tracing::info!(comment_id = %id, post_id = %request.post_id, author_id, "Comment created");

        self.require_comment(&id).await
    }

    /// Replace a comment's body and mark it edited. Only its author may do so.
    pub async fn update_comment(
        &self,
        id: &str,
        actor_id: &str,
        body: &str,
    ) -> Result<Comment, AppError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::Validation("Comment body is required".to_string()));
        }

        let existing = self.require_comment(id).await?;
        if existing.author.id != actor_id {
            return Err(AppError::Forbidden(
                "Only the author may edit this comment".to_string(),
            ));
        }

        let result = sqlx::query(
            "UPDATE comments SET body = ?, is_edited = 1, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(body)
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {} not found", id)));
        }

        self.require_comment(id).await
    }

    /// Remove a comment. Its author or an admin may do so; the author loses
    /// the reputation the comment earned in the same transaction.
    ///
    /// Replies stay attached to the removed comment, which is then listed as
    /// a tombstone while it has live replies.
    pub async fn delete_comment(&self, id: &str, actor_id: &str) -> Result<(), AppError> {
        let existing = self.require_comment(id).await?;
        if existing.author.id != actor_id && !self.get_user(actor_id).await?.role.is_admin() {
            return Err(AppError::Forbidden(
                "Only the author may delete this comment".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("UPDATE comments SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(now_timestamp())
                .bind(id)
                .execute(&mut *tx)
                .await?;

        // Lost a race with another delete: that one already debited.
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {} not found", id)));
        }

        reputation::record(&mut tx, &existing.author.id, ReputationEvent::CommentDeleted).await?;

        tx.commit().await?;

        tracing::info!(comment_id = %id, actor_id, "Comment deleted");
        Ok(())
    }

    /// Mark a comment as an accepted answer. Only the post's author may do so.
    ///
    /// The comment's author is credited only on the transition from not
    /// accepted to accepted; accepting again is a no-op.
    pub async fn accept_comment(&self, id: &str, actor_id: &str) -> Result<Comment, AppError> {
        let row = sqlx::query(
            r#"SELECT c.author_id, p.author_id AS post_author_id
               FROM comments c JOIN posts p ON p.id = c.post_id
               WHERE c.id = ? AND c.deleted_at IS NULL AND p.deleted_at IS NULL"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))?;

        let comment_author: String = row.get("author_id");
        let post_author: String = row.get("post_author_id");
        if post_author != actor_id {
            return Err(AppError::Forbidden(
                "Only the post author can accept comments".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            "UPDATE comments SET is_accepted = 1, updated_at = ? WHERE id = ? AND is_accepted = 0 AND deleted_at IS NULL",
        )
        .bind(now_timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if flipped {
            reputation::record(&mut tx, &comment_author, ReputationEvent::CommentAccepted).await?;
        }

        tx.commit().await?;

        if flipped {
            tracing::info!(comment_id = %id, author_id = %comment_author, "Comment accepted");
        } else {
            tracing::debug!(comment_id = %id, "Comment already accepted");
        }

        self.require_comment(id).await
    }

    async fn ensure_live_post(&self, post_id: &str) -> Result<(), AppError> {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM posts WHERE id = ? AND deleted_at IS NULL")
                .bind(post_id)
                .fetch_optional(&self.pool)
                .await?;

        exists
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))
    }
}

/// Insert a comment only while its post, and its parent if any, are still
/// live. The checks run in the same statement as the insert, so a post or
/// parent removed after the caller's pre-checks yields `NotFound` and the
/// caller's transaction rolls back before any reputation moves.
async fn insert_live_comment(
    conn: &mut SqliteConnection,
    id: &str,
    author_id: &str,
    body: &str,
    request: &CreateCommentRequest,
    now: &str,
) -> Result<(), AppError> {
    let inserted = sqlx::query(
        r#"INSERT INTO comments (
            id, body, author_id, post_id, parent_id, like_count, is_accepted, is_edited,
            created_at, updated_at
        )
        SELECT ?, ?, ?, ?, ?, 0, 0, 0, ?, ?
        WHERE EXISTS (SELECT 1 FROM posts WHERE id = ? AND deleted_at IS NULL)
          AND (
            ? IS NULL
            OR EXISTS (
                SELECT 1 FROM comments
                WHERE id = ? AND post_id = ? AND deleted_at IS NULL
            )
          )"#,
    )
    .bind(id)
    .bind(body)
    .bind(author_id)
    .bind(&request.post_id)
    .bind(&request.parent_id)
    .bind(now)
    .bind(now)
    .bind(&request.post_id)
    .bind(&request.parent_id)
    .bind(&request.parent_id)
    .bind(&request.post_id)
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::NotFound(match &request.parent_id {
            Some(parent_id) => format!(
                "Post {} or comment {} not found",
                request.post_id, parent_id
            ),
            None => format!("Post {} not found", request.post_id),
        }));
    }

    Ok(())
}
