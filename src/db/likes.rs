//! Post likes: one per user and post, toggled on and off.

use super::{now_timestamp, Repository};
use crate::errors::{retry_on_conflict, AppError};
use crate::models::{LikeStatus, LikeToggle};

impl Repository {
    /// Like the post if the user has not liked it yet, otherwise take the
    /// like back. The like row and the post's counter change together.
    pub async fn toggle_like(&self, user_id: &str, post_id: &str) -> Result<LikeToggle, AppError> {
        self.get_user(user_id).await?;
        self.require_post(post_id).await?;

        let toggle =
            retry_on_conflict("toggle like", || self.toggle_like_once(user_id, post_id)).await?;

        tracing::debug!(
            user_id,
            post_id,
            status = ?toggle.status,
            like_count = toggle.like_count,
            "Like toggled"
        );
        Ok(toggle)
    }

    async fn toggle_like_once(&self, user_id: &str, post_id: &str) -> Result<LikeToggle, AppError> {
        let mut tx = self.pool.begin().await?;

        // Try the removal first: it both answers "was it liked?" and takes the
        // write lock before anything is read.
        let removed = sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let (status, delta) = if removed > 0 {
            (LikeStatus::Unliked, -1_i64)
        } else {
            sqlx::query("INSERT INTO likes (id, user_id, post_id, created_at) VALUES (?, ?, ?, ?)")
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(user_id)
                .bind(post_id)
                .bind(now_timestamp())
                .execute(&mut *tx)
                .await?;
            (LikeStatus::Liked, 1)
        };

        let updated = sqlx::query(
            "UPDATE posts SET like_count = like_count + ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(delta)
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", post_id)));
        }

        let like_count: i64 = sqlx::query_scalar("SELECT like_count FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(LikeToggle { status, like_count })
    }

    /// Number of like rows recorded for a post.
    pub async fn count_likes(&self, post_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
