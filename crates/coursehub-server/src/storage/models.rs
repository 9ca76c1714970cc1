//! Data models for coursehub storage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RevokedToken {
    pub token_id: String,
    /// SHA-256 of the bearer string; the raw token is never stored.
    pub token_hash: String,
    pub expires_at: i64,
    pub revoked_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub creator_id: String,
    pub enrolled_count: i64,
    pub active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unit {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub position: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WatchFact {
    pub user_id: String,
    pub unit_id: String,
    pub watched: bool,
    pub last_changed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Enrollment {
    pub user_id: String,
    pub course_id: String,
    pub status: String,
    pub progress: f64,
    pub enrolled_at: i64,
    pub completed_at: Option<i64>,
    pub version: i64,
}

impl Enrollment {
    pub fn status(&self) -> EnrollmentStatus {
        EnrollmentStatus::from_db(&self.status)
    }

    pub fn is_completed(&self) -> bool {
        self.status() == EnrollmentStatus::Completed
    }
}

/// Lifecycle of a user's enrollment. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// The column carries a CHECK constraint, so anything but `completed`
    /// is the initial state.
    fn from_db(s: &str) -> Self {
        if s == Self::Completed.as_str() {
            Self::Completed
        } else {
            Self::InProgress
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Certificate {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub issued_at: i64,
}
