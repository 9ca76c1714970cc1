//! Watch-fact, enrollment and certificate queries.

use super::db::{CourseDatabase, DatabaseError};
use super::models::{Certificate, Enrollment, EnrollmentStatus, WatchFact};

/// One progress write: an optional watch fact plus the recomputed
/// enrollment row, committed together.
pub struct ProgressWrite<'a> {
    pub user_id: &'a str,
    pub course_id: &'a str,
    /// `(unit_id, watched)` to record before recomputing.
    pub watch: Option<(&'a str, bool)>,
    /// Id used if this write completes the enrollment.
    pub certificate_id: &'a str,
    pub now: i64,
}

/// The enrollment row a [`ProgressWrite`] produced.
#[derive(Debug, Clone)]
pub struct AppliedProgress {
    pub enrollment: Enrollment,
    /// Set only when this write moved the enrollment to `completed`.
    pub certificate: Option<Certificate>,
}

impl CourseDatabase {
    // =========================================================================
    // Watch facts
    // =========================================================================

    /// Insert or overwrite the watch fact for `(user_id, unit_id)`.
    pub async fn upsert_watch_fact(
        &self,
        user_id: &str,
        unit_id: &str,
        watched: bool,
        now: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO watch_facts (user_id, unit_id, watched, last_changed_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (user_id, unit_id) DO UPDATE SET watched = excluded.watched, last_changed_at = excluded.last_changed_at",
        )
        .bind(user_id)
        .bind(unit_id)
        .bind(watched)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn get_watch_fact(
        &self,
        user_id: &str,
        unit_id: &str,
    ) -> Result<Option<WatchFact>, DatabaseError> {
        let fact = sqlx::query_as::<_, WatchFact>(
            "SELECT * FROM watch_facts WHERE user_id = ? AND unit_id = ?",
        )
        .bind(user_id)
        .bind(unit_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(fact)
    }

    /// Number of the course's units the user currently has marked watched.
    pub async fn count_watched_units(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM watch_facts w JOIN units u ON u.id = w.unit_id \
             WHERE w.user_id = ? AND u.course_id = ? AND w.watched = 1",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(self.pool())
        .await?;

        Ok(row.0)
    }

    // =========================================================================
    // Enrollments
    // =========================================================================

    /// Create an in-progress enrollment. A second enrollment for the same
    /// pair fails with `Conflict` (primary key).
    pub async fn create_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
        now: i64,
    ) -> Result<Enrollment, DatabaseError> {
        sqlx::query(
            "INSERT INTO enrollments (user_id, course_id, status, progress, enrolled_at, completed_at, version) VALUES (?, ?, ?, 0, ?, NULL, 0)",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(EnrollmentStatus::InProgress.as_str())
        .bind(now)
        .execute(self.pool())
        .await?;

        self.find_enrollment(user_id, course_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Enrollment {user_id}/{course_id}")))
    }

    pub async fn find_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, DatabaseError> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE user_id = ? AND course_id = ?",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(enrollment)
    }

    /// All enrollments of a user, newest first.
    pub async fn list_enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>, DatabaseError> {
        let enrollments = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE user_id = ? ORDER BY enrolled_at DESC, course_id",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(enrollments)
    }

    /// Record the watch fact, recompute progress and, on reaching 100%,
    /// complete the enrollment and insert its certificate, all in one
    /// transaction.
    ///
    /// Progress is derived inside the `UPDATE` from the committed watch facts,
    /// so concurrent writers queue on the database write lock instead of
    /// overwriting each other. Every write bumps `version`.
    ///
    /// Returns `None` when no in-progress enrollment exists or the course has
    /// no units; the watch fact is still recorded in that case.
    pub async fn apply_progress(
        &self,
        write: &ProgressWrite<'_>,
    ) -> Result<Option<AppliedProgress>, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        if let Some((unit_id, watched)) = write.watch {
            sqlx::query(
                "INSERT INTO watch_facts (user_id, unit_id, watched, last_changed_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (user_id, unit_id) DO UPDATE SET watched = excluded.watched, last_changed_at = excluded.last_changed_at",
            )
            .bind(write.user_id)
            .bind(unit_id)
            .bind(watched)
            .bind(write.now)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            "WITH p AS (SELECT \
                 (SELECT COUNT(*) FROM units WHERE course_id = ?) AS total, \
                 (SELECT COUNT(*) FROM watch_facts w JOIN units u ON u.id = w.unit_id \
                  WHERE w.user_id = ? AND u.course_id = ? AND w.watched = 1) AS watched) \
             UPDATE enrollments SET \
                 progress = (SELECT MIN(100.0, watched * 100.0 / total) FROM p), \
                 status = (SELECT CASE WHEN watched >= total THEN ? ELSE ? END FROM p), \
                 completed_at = (SELECT CASE WHEN watched >= total THEN ? END FROM p), \
                 version = version + 1 \
             WHERE user_id = ? AND course_id = ? AND status = ? AND (SELECT total FROM p) > 0",
        )
        .bind(write.course_id)
        .bind(write.user_id)
        .bind(write.course_id)
        .bind(EnrollmentStatus::Completed.as_str())
        .bind(EnrollmentStatus::InProgress.as_str())
        .bind(write.now)
        .bind(write.user_id)
        .bind(write.course_id)
        .bind(EnrollmentStatus::InProgress.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(None);
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE user_id = ? AND course_id = ?",
        )
        .bind(write.user_id)
        .bind(write.course_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut certificate = None;
        if enrollment.is_completed() {
            sqlx::query(
                "INSERT INTO certificates (id, user_id, course_id, issued_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (user_id, course_id) DO NOTHING",
            )
            .bind(write.certificate_id)
            .bind(write.user_id)
            .bind(write.course_id)
            .bind(write.now)
            .execute(&mut *tx)
            .await?;

            certificate = sqlx::query_as::<_, Certificate>(
                "SELECT * FROM certificates WHERE user_id = ? AND course_id = ?",
            )
            .bind(write.user_id)
            .bind(write.course_id)
            .fetch_optional(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(AppliedProgress {
            enrollment,
            certificate,
        }))
    }

    // =========================================================================
    // Certificates
    // =========================================================================

    /// Insert a certificate unless one already exists for the pair.
    ///
    /// Returns `true` only for the call that actually created the row.
    pub async fn insert_certificate_if_absent(
        &self,
        id: &str,
        user_id: &str,
        course_id: &str,
        issued_at: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO certificates (id, user_id, course_id, issued_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (user_id, course_id) DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .bind(course_id)
        .bind(issued_at)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_certificate(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Certificate>, DatabaseError> {
        let cert = sqlx::query_as::<_, Certificate>(
            "SELECT * FROM certificates WHERE user_id = ? AND course_id = ?",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(cert)
    }

    pub async fn count_certificates(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<i64, DatabaseError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM certificates WHERE user_id = ? AND course_id = ?")
                .bind(user_id)
                .bind(course_id)
                .fetch_one(self.pool())
                .await?;

        Ok(row.0)
    }
}
