//! Progress writes racing on a file-backed database with a real connection
//! pool, so statements from different tasks actually overlap.

#![allow(clippy::unwrap_used, clippy::print_stderr)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlx::Connection;

use coursehub_server::notifications::{Notification, NotificationError, NotificationKind, Notifier};
use coursehub_server::server::{EnrollmentError, EnrollmentService};
use coursehub_server::storage::{CourseDatabase, NewUser};

const NOW: i64 = 1_700_000_000;
const UNITS: usize = 40;

#[derive(Default)]
struct CompletionCounter(AtomicUsize);

impl Notifier for CompletionCounter {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        if notification.kind == NotificationKind::Completed {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

async fn seeded(path: &std::path::Path, learners: usize) -> CourseDatabase {
    let db = CourseDatabase::open(path).await.unwrap();
    let mut users = vec![("lect".to_string(), "lecturer".to_string())];
    users.extend((0..learners).map(|i| (format!("u{i}"), format!("learner{i}"))));
    for (id, username) in &users {
        db.create_user(&NewUser {
            id,
            username,
            email: "someone@example.com",
            password_hash: "hash",
            role: "member",
        })
        .await
        .unwrap();
    }
    db.create_course("c1", "Rust 101", "lect").await.unwrap();
    for i in 0..UNITS {
        db.create_unit(&format!("v{i}"), "c1", "Video", i64::try_from(i).unwrap())
            .await
            .unwrap();
    }
    db
}

async fn watch_all(svc: &Arc<EnrollmentService>, user: &str, units: usize) -> usize {
    let mut handles = Vec::new();
    for i in 0..units {
        let svc = Arc::clone(svc);
        let user = user.to_string();
        handles.push(tokio::spawn(async move {
            svc.mark_unit_watched(&user, &format!("v{i}"), true, NOW + 10)
                .await
        }));
    }

    let mut errors = 0;
    for handle in handles {
        if let Err(e) = handle.await.unwrap() {
            eprintln!("watch failed: {e}");
            errors += 1;
        }
    }
    errors
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn many_concurrent_watches_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded(&dir.path().join("coursehub.db"), 1).await;
    let svc = Arc::new(EnrollmentService::new(
        db.clone(),
        Arc::new(CompletionCounter::default()),
    ));
    svc.enroll("u0", "c1", NOW).await.unwrap();

    let errors = watch_all(&svc, "u0", UNITS - 1).await;
    assert_eq!(errors, 0);

    let stored = db.find_enrollment("u0", "c1").await.unwrap().unwrap();
    assert!((stored.progress - 97.5).abs() < 1e-9, "progress {}", stored.progress);
    assert!(!stored.is_completed());
    assert_eq!(stored.version, i64::try_from(UNITS - 1).unwrap());
    assert!(db.find_certificate("u0", "c1").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_final_watches_complete_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded(&dir.path().join("coursehub.db"), 3).await;
    let completions = Arc::new(CompletionCounter::default());
    let svc = Arc::new(EnrollmentService::new(db.clone(), completions.clone()));

    for user in ["u0", "u1", "u2"] {
        svc.enroll(user, "c1", NOW).await.unwrap();
    }

    let (a, b, c) = tokio::join!(
        watch_all(&svc, "u0", UNITS),
        watch_all(&svc, "u1", UNITS),
        watch_all(&svc, "u2", UNITS),
    );
    assert_eq!(a + b + c, 0);

    for user in ["u0", "u1", "u2"] {
        let stored = db.find_enrollment(user, "c1").await.unwrap().unwrap();
        assert!(stored.is_completed());
        assert!((stored.progress - 100.0).abs() < 1e-9);
        assert_eq!(db.count_certificates(user, "c1").await.unwrap(), 1);
    }
    assert_eq!(completions.0.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn locked_database_reports_contention_without_recording() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coursehub.db");
    let db = seeded(&path, 1).await;
    let svc = EnrollmentService::new(db.clone(), Arc::new(CompletionCounter::default()))
        .with_max_retries(1);
    svc.enroll("u0", "c1", NOW).await.unwrap();

    let mut holder = sqlx::SqliteConnection::connect(&format!("sqlite:{}", path.display()))
        .await
        .unwrap();
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut holder)
        .await
        .unwrap();

    let err = svc
        .mark_unit_watched("u0", "v0", true, NOW + 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EnrollmentError::Contention));

    sqlx::query("ROLLBACK").execute(&mut holder).await.unwrap();
    assert!(db.get_watch_fact("u0", "v0").await.unwrap().is_none());
    assert_eq!(db.find_enrollment("u0", "c1").await.unwrap().unwrap().version, 0);
}
