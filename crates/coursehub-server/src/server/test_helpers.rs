//! Shared test helpers for the service test modules.
//!
//! Provides notifier doubles and service setup used by `session_svc_tests`
//! and `enrollment_svc_tests`.

use std::sync::{Arc, Mutex};

use crate::auth::JwtManager;
use crate::notifications::{Notification, NotificationError, NotificationKind, Notifier};
use crate::storage::{CourseDatabase, NewUser};

use super::enrollment_svc::EnrollmentService;
use super::session_svc::SessionService;

pub const NOW: i64 = 1_700_000_000;
pub const ACCESS_TTL: i64 = 3600;
pub const REFRESH_TTL: i64 = 86400;

/// Keeps every notification it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|n| n.kind).collect()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Rejects every notification.
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Request("sink unreachable".into()))
    }
}

pub fn test_jwt() -> Arc<JwtManager> {
    Arc::new(JwtManager::new(b"test-secret", ACCESS_TTL, REFRESH_TTL))
}

pub async fn session_service(
    notifier: Arc<dyn Notifier>,
) -> (SessionService, CourseDatabase) {
    let db = CourseDatabase::open_in_memory().await.unwrap();
    let svc = SessionService::new(db.clone(), test_jwt(), notifier);
    (svc, db)
}

pub async fn insert_user(db: &CourseDatabase, id: &str, username: &str) {
    db.create_user(&NewUser {
        id,
        username,
        email: &format!("{username}@example.com"),
        password_hash: "unused",
        role: "member",
    })
    .await
    .unwrap();
}

/// Learner `u1`, lecturer `lect` and course `c1` with units `v0..v{units}`.
pub async fn enrollment_service(
    units: usize,
    notifier: Arc<dyn Notifier>,
) -> (EnrollmentService, CourseDatabase) {
    let db = CourseDatabase::open_in_memory().await.unwrap();
    insert_user(&db, "lect", "lecturer").await;
    insert_user(&db, "u1", "alice").await;
    db.create_course("c1", "Rust 101", "lect").await.unwrap();
    for i in 0..units {
        db.create_unit(&format!("v{i}"), "c1", &format!("Video {i}"), i64::try_from(i).unwrap())
            .await
            .unwrap();
    }
    let svc = EnrollmentService::new(db.clone(), notifier);
    (svc, db)
}
