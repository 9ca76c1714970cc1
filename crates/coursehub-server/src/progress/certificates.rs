//! Idempotent certificate issuance.

use tracing::{debug, info};

use crate::storage::{AppliedProgress, Certificate, CourseDatabase, DatabaseError, ProgressWrite};

/// Issues at most one certificate per `(user, course)`.
///
/// Uniqueness comes from the `UNIQUE(user_id, course_id)` constraint; a
/// concurrent second insert is silently dropped and the existing row wins.
#[derive(Clone)]
pub struct CertificateIssuer {
    db: CourseDatabase,
}

impl CertificateIssuer {
    pub const fn new(db: CourseDatabase) -> Self {
        Self { db }
    }

    /// Issue a certificate unless one exists, returning whichever is stored.
    pub async fn issue_if_absent(
        &self,
        user_id: &str,
        course_id: &str,
        now: i64,
    ) -> Result<Certificate, DatabaseError> {
        let id = uuid::Uuid::new_v4().to_string();
        let inserted = self
            .db
            .insert_certificate_if_absent(&id, user_id, course_id, now)
            .await?;

        if inserted {
            record_issued(user_id, course_id, &id);
        } else {
            debug!(user_id, course_id, "Certificate already issued");
        }

        self.stored(user_id, course_id).await
    }

    /// Record an optional watch fact and recompute progress; a write that
    /// completes the enrollment issues its certificate in the same
    /// transaction.
    ///
    /// Returns `None` when there was no in-progress enrollment to update.
    pub async fn apply_progress(
        &self,
        user_id: &str,
        course_id: &str,
        watch: Option<(&str, bool)>,
        now: i64,
    ) -> Result<Option<AppliedProgress>, DatabaseError> {
        let id = uuid::Uuid::new_v4().to_string();
        let applied = self
            .db
            .apply_progress(&ProgressWrite {
                user_id,
                course_id,
                watch,
                certificate_id: &id,
                now,
            })
            .await?;

        if let Some(cert) = applied.as_ref().and_then(|a| a.certificate.as_ref()) {
            if cert.id == id {
                record_issued(user_id, course_id, &id);
            } else {
                debug!(user_id, course_id, "Certificate already issued");
            }
        }
        Ok(applied)
    }

    pub async fn certificate_for(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Certificate>, DatabaseError> {
        self.db.find_certificate(user_id, course_id).await
    }

    async fn stored(&self, user_id: &str, course_id: &str) -> Result<Certificate, DatabaseError> {
        self.db
            .find_certificate(user_id, course_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Certificate {user_id}/{course_id}")))
    }
}

fn record_issued(user_id: &str, course_id: &str, certificate_id: &str) {
    info!(user_id, course_id, certificate_id, "Certificate issued");
    #[cfg(feature = "metrics")]
    coursehub_core::metrics::record_certificate_issued();
}
