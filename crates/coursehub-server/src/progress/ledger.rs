//! Watch facts and completion percentage.

use tracing::debug;

use crate::server::EnrollmentError;
use crate::storage::{CourseDatabase, DatabaseError};

/// Records watch facts and derives completion from them.
///
/// Setting a fact has no enrollment side effects; callers recompute progress
/// afterwards.
#[derive(Clone)]
pub struct ProgressLedger {
    db: CourseDatabase,
}

impl ProgressLedger {
    pub const fn new(db: CourseDatabase) -> Self {
        Self { db }
    }

    /// Record whether `user_id` has watched `unit_id`. Repeating the same
    /// value only moves `last_changed_at`.
    pub async fn set_watched(
        &self,
        user_id: &str,
        unit_id: &str,
        watched: bool,
        now: i64,
    ) -> Result<(), DatabaseError> {
        self.db
            .upsert_watch_fact(user_id, unit_id, watched, now)
            .await?;
        debug!(user_id, unit_id, watched, "Watch fact recorded");
        Ok(())
    }

    /// Percentage of the course's units the user has watched, in `[0, 100]`.
    ///
    /// A course with no units has no defined completion and yields
    /// [`EnrollmentError::NoUnits`].
    #[allow(clippy::cast_precision_loss)]
    pub async fn completion_percent(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<f64, EnrollmentError> {
        let total = self.db.count_units_in_course(course_id).await?;
        if total == 0 {
            return Err(EnrollmentError::NoUnits);
        }

        let watched = self.db.count_watched_units(user_id, course_id).await?;
        let percent = watched as f64 * 100.0 / total as f64;
        Ok(percent.clamp(0.0, 100.0))
    }
}
