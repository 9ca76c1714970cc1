//! Identity and catalog queries for the coursehub server.

use coursehub_core::db::unix_timestamp;

use super::db::{CourseDatabase, DatabaseError};
use super::models::{Course, Unit, User};

/// Parameters for creating a user.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
}

impl CourseDatabase {
    // =========================================================================
    // User queries
    // =========================================================================

    /// Create a new (enabled) user. A taken username yields `Conflict`.
    pub async fn create_user(&self, user: &NewUser<'_>) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, enabled, created_at, updated_at) VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(user.id)
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_user(user.id).await
    }

    /// Get a user by ID, enabled or not.
    pub async fn get_user(&self, id: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    pub async fn find_enabled_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ? AND enabled = 1")
                .bind(username)
                .fetch_optional(self.pool())
                .await?;

        Ok(user)
    }

    pub async fn find_enabled_user_by_id(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? AND enabled = 1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    /// Enable or disable an account. Returns `false` if the user is unknown.
    pub async fn set_user_enabled(&self, id: &str, enabled: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE users SET enabled = ?, updated_at = ? WHERE id = ?")
            .bind(enabled)
            .bind(unix_timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Catalog queries
    // =========================================================================

    /// Create an active course owned by `creator_id`.
    pub async fn create_course(
        &self,
        id: &str,
        title: &str,
        creator_id: &str,
    ) -> Result<Course, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO courses (id, title, creator_id, enrolled_count, active, created_at) VALUES (?, ?, ?, 0, 1, ?)",
        )
        .bind(id)
        .bind(title)
        .bind(creator_id)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.find_course(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Course {id}")))
    }

    pub async fn find_course(&self, id: &str) -> Result<Option<Course>, DatabaseError> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(course)
    }

    /// Soft-delete or restore a course.
    pub async fn set_course_active(&self, id: &str, active: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE courses SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Add a unit to a course.
    pub async fn create_unit(
        &self,
        id: &str,
        course_id: &str,
        title: &str,
        position: i64,
    ) -> Result<Unit, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO units (id, course_id, title, position, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(course_id)
        .bind(title)
        .bind(position)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.find_unit(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Unit {id}")))
    }

    pub async fn find_unit(&self, id: &str) -> Result<Option<Unit>, DatabaseError> {
        let unit = sqlx::query_as::<_, Unit>("SELECT * FROM units WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(unit)
    }

    pub async fn count_units_in_course(&self, course_id: &str) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM units WHERE course_id = ?")
            .bind(course_id)
            .fetch_one(self.pool())
            .await?;

        Ok(row.0)
    }

    /// Unit IDs of a course in presentation order.
    pub async fn units_of(&self, course_id: &str) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM units WHERE course_id = ? ORDER BY position, id")
                .bind(course_id)
                .fetch_all(self.pool())
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Recompute the informational `enrolled_count` snapshot for a course.
    pub async fn refresh_enrollment_count(&self, course_id: &str) -> Result<i64, DatabaseError> {
        sqlx::query(
            "UPDATE courses SET enrolled_count = (SELECT COUNT(*) FROM enrollments WHERE course_id = ?) WHERE id = ?",
        )
        .bind(course_id)
        .bind(course_id)
        .execute(self.pool())
        .await?;

        let row: (i64,) = sqlx::query_as("SELECT enrolled_count FROM courses WHERE id = ?")
            .bind(course_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Course {course_id}")))?;

        Ok(row.0)
    }
}
