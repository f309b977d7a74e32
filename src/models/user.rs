//! User model. Users are owned by the identity side of the forum; the
//! content engine only reads them and moves their reputation.

use serde::{Deserialize, Serialize};

/// Forum role. `Admin` may remove any post or comment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Enthusiast,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Enthusiast => "ENTHUSIAST",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }

    /// Unknown stored values fall back to the default role.
    pub fn parse(s: &str) -> Self {
        match s {
            "MODERATOR" => Role::Moderator,
            "ADMIN" => Role::Admin,
            _ => Role::Enthusiast,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// A registered forum user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// May go negative.
    pub reputation: i64,
    pub last_seen: String,
    pub created_at: String,
}

/// Author information embedded in posts and comments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub reputation: i64,
}

/// Request body for registering a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Never read from request bodies: self-registration always yields the
    /// default role. Elevated roles are granted by trusted callers only.
    #[serde(skip_deserializing)]
    pub role: Option<Role>,
}
