//! User records: the identity side the content engine reads from.

use sqlx::SqliteConnection;

use super::repository::{user_from_row, USER_SELECT};
use super::{now_timestamp, Repository};
use crate::errors::AppError;
use crate::models::{CreateUserRequest, User};

impl Repository {
    /// Register a user with zero reputation.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, AppError> {
        let name = request.name.trim();
        let email = request.email.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if email.is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let role = request.role.unwrap_or_default();

        sqlx::query(
            "INSERT INTO users (id, name, email, role, reputation, last_seen, created_at) VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(email)
        .bind(role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(format!("Email {} is already registered", email)),
            other => other,
        })?;

        tracing::info!(user_id = %id, "User registered");

        Ok(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role,
            reputation: 0,
            last_seen: now.clone(),
            created_at: now,
        })
    }

    /// Get a user by ID.
    pub async fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("{USER_SELECT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Get a user by ID, failing with `NotFound` if it does not exist.
    pub async fn get_user(&self, id: &str) -> Result<User, AppError> {
        self.find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}

/// Record that the user just acted. Runs inside the caller's transaction.
pub(super) async fn touch_last_seen(
    conn: &mut SqliteConnection,
    user_id: &str,
    now: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
        .bind(now)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
