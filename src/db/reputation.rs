//! Reputation ledger.
//!
//! Reputation is never written on its own: every delta is applied on the
//! connection of the transaction that performs the triggering content change,
//! so both commit or roll back together. Nothing here opens a transaction.

use sqlx::SqliteConnection;

use crate::errors::AppError;

/// Content events that move a user's reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationEvent {
    /// The user wrote a comment.
    CommentCreated,
    /// A post author accepted the user's comment.
    CommentAccepted,
    /// The user's comment was removed.
    CommentDeleted,
}

impl ReputationEvent {
    pub const fn delta(self) -> i64 {
        match self {
            ReputationEvent::CommentCreated => 1,
            ReputationEvent::CommentAccepted => 15,
            ReputationEvent::CommentDeleted => -1,
        }
    }
}

/// Apply a signed reputation delta as a relative update.
///
/// Fails with `NotFound` when the user does not exist, which aborts the
/// caller's transaction.
pub async fn apply_delta(
    conn: &mut SqliteConnection,
    user_id: &str,
    delta: i64,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE users SET reputation = reputation + ? WHERE id = ?")
        .bind(delta)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    Ok(())
}

/// Apply the delta that `event` earns `user_id`.
pub async fn record(
    conn: &mut SqliteConnection,
    user_id: &str,
    event: ReputationEvent,
) -> Result<(), AppError> {
    apply_delta(conn, user_id, event.delta()).await?;
    tracing::debug!(user_id, ?event, delta = event.delta(), "Reputation adjusted");
    Ok(())
}
