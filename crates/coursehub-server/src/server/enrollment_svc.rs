//! Enrollment state machine: enroll, recompute progress, complete.
//!
//! An enrollment starts `in_progress` at 0% and moves to `completed` exactly
//! once, when its watched-unit percentage reaches 100. Completion is final:
//! later watch changes no longer touch the row.
//!
//! A progress write records the watch fact, derives the percentage from the
//! stored facts and bumps the row's `version` in a single transaction, so
//! concurrent writers for one enrollment are serialized by the database
//! write lock. The completing write also issues the certificate in that
//! transaction.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::notifications::{Notification, NotificationKind, Notifier};
use crate::progress::{CertificateIssuer, ProgressLedger};
use crate::storage::{Certificate, CourseDatabase, Enrollment};

use super::error::EnrollmentError;

/// Default number of attempts at a progress write that keeps hitting a
/// locked database.
pub const DEFAULT_MAX_PROGRESS_RETRIES: u32 = 8;

pub struct EnrollmentService {
    db: CourseDatabase,
    ledger: ProgressLedger,
    certificates: CertificateIssuer,
    notifier: Arc<dyn Notifier>,
    max_retries: u32,
}

impl EnrollmentService {
    pub fn new(db: CourseDatabase, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger: ProgressLedger::new(db.clone()),
            certificates: CertificateIssuer::new(db.clone()),
            db,
            notifier,
            max_retries: DEFAULT_MAX_PROGRESS_RETRIES,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub const fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    /// Enroll a user in an active course.
    #[instrument(skip(self))]
    pub async fn enroll(
        &self,
        user_id: &str,
        course_id: &str,
        now: i64,
    ) -> Result<Enrollment, EnrollmentError> {
        let user = self
            .db
            .find_enabled_user_by_id(user_id)
            .await?
            .ok_or(EnrollmentError::UserNotFound)?;
        let course = self
            .db
            .find_course(course_id)
            .await?
            .filter(|c| c.active)
            .ok_or(EnrollmentError::CourseNotFound)?;

        let enrollment = self
            .db
            .create_enrollment(user_id, course_id, now)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    EnrollmentError::AlreadyEnrolled
                } else {
                    EnrollmentError::Storage(e)
                }
            })?;

        // Informational snapshot; a failure here does not undo the enrollment.
        match self.db.refresh_enrollment_count(course_id).await {
            Ok(count) => debug!(enrolled_count = count, "Enrollment count refreshed"),
            Err(e) => warn!(error = %e, "Failed to refresh enrollment count"),
        }

        info!(user_id, course_id, "User enrolled");
        self.send(
            Notification::new(NotificationKind::Enrolled, &user.email)
                .with("course_id", course_id)
                .with("course_title", &course.title),
        );

        Ok(enrollment)
    }

    /// Bring the stored progress in line with the user's watch facts.
    ///
    /// A completed enrollment is returned unchanged.
    #[instrument(skip(self))]
    pub async fn recompute_progress(
        &self,
        user_id: &str,
        course_id: &str,
        now: i64,
    ) -> Result<Enrollment, EnrollmentError> {
        self.apply(user_id, course_id, None, now).await
    }

    /// Record a watch fact for a unit and recompute its course's progress in
    /// the same write.
    #[instrument(skip(self))]
    pub async fn mark_unit_watched(
        &self,
        user_id: &str,
        unit_id: &str,
        watched: bool,
        now: i64,
    ) -> Result<Enrollment, EnrollmentError> {
        let unit = self
            .db
            .find_unit(unit_id)
            .await?
            .ok_or(EnrollmentError::UnitNotFound)?;

        // Watching outside an enrollment is not recorded.
        self.enrollment(user_id, &unit.course_id).await?;

        self.apply(user_id, &unit.course_id, Some((unit_id, watched)), now)
            .await
    }

    pub async fn list_enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>, EnrollmentError> {
        Ok(self.db.list_enrollments(user_id).await?)
    }

    pub async fn certificate(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Certificate, EnrollmentError> {
        self.certificates
            .certificate_for(user_id, course_id)
            .await?
            .ok_or(EnrollmentError::CertificateNotFound)
    }

    async fn apply(
        &self,
        user_id: &str,
        course_id: &str,
        watch: Option<(&str, bool)>,
        now: i64,
    ) -> Result<Enrollment, EnrollmentError> {
        let mut attempt = 1;
        let applied = loop {
            match self
                .certificates
                .apply_progress(user_id, course_id, watch, now)
                .await
            {
                Ok(applied) => break applied,
                Err(e) if e.is_busy() && attempt < self.max_retries => {
                    debug!(attempt, error = %e, "Progress write found the database locked, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_busy() {
                        warn!(user_id, course_id, attempts = attempt, "Progress write gave up");
                    }
                    return Err(e.into());
                }
            }
        };

        let Some(applied) = applied else {
            // Nothing in progress was written: report why.
            let current = self.enrollment(user_id, course_id).await?;
            if !current.is_completed() {
                self.ledger.completion_percent(user_id, course_id).await?;
            }
            return Ok(current);
        };

        debug!(progress = applied.enrollment.progress, "Progress updated");
        if let Some(cert) = &applied.certificate {
            self.on_completed(user_id, course_id, cert).await;
        }
        Ok(applied.enrollment)
    }

    async fn enrollment(&self, user_id: &str, course_id: &str) -> Result<Enrollment, EnrollmentError> {
        self.db
            .find_enrollment(user_id, course_id)
            .await?
            .ok_or(EnrollmentError::NotEnrolled)
    }

    async fn on_completed(&self, user_id: &str, course_id: &str, cert: &Certificate) {
        info!(user_id, course_id, certificate_id = %cert.id, "Enrollment completed");

        let recipient = match self.db.find_enabled_user_by_id(user_id).await {
            Ok(Some(user)) => user.email,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Could not resolve completion recipient");
                return;
            }
        };
        self.send(
            Notification::new(NotificationKind::Completed, recipient)
                .with("course_id", course_id)
                .with("certificate_id", &cert.id),
        );
    }

    fn send(&self, notification: Notification) {
        let kind = notification.kind.as_str();
        if let Err(e) = self.notifier.notify(notification) {
            warn!(kind, error = %e, "Notification not delivered");
        }
    }
}
