//! Storage layer tests for coursehub.

use super::db::CourseDatabase;
use super::models::EnrollmentStatus;
use super::queries::NewUser;
use super::queries_progress::ProgressWrite;

async fn test_db() -> CourseDatabase {
    CourseDatabase::open_in_memory().await.unwrap()
}

async fn create_user(db: &CourseDatabase, id: &str, username: &str) {
    db.create_user(&NewUser {
        id,
        username,
        email: "someone@example.com",
        password_hash: "hash123",
        role: "member",
    })
    .await
    .unwrap();
}

/// A lecturer, a learner `u1`, and course `c1` with `units` units.
async fn seeded_db(units: usize) -> CourseDatabase {
    let db = test_db().await;
    create_user(&db, "lect", "lecturer").await;
    create_user(&db, "u1", "alice").await;
    db.create_course("c1", "Rust 101", "lect").await.unwrap();
    for i in 0..units {
        db.create_unit(&format!("v{i}"), "c1", &format!("Video {i}"), i as i64)
            .await
            .unwrap();
    }
    db
}

// === User tests ===

#[tokio::test]
async fn create_and_get_user() {
    let db = test_db().await;
    create_user(&db, "u1", "alice").await;

    let user = db.get_user("u1").await.unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.role, "member");
    assert!(user.enabled);
}

#[tokio::test]
async fn duplicate_username_is_conflict() {
    let db = test_db().await;
    create_user(&db, "u1", "alice").await;

    let err = db
        .create_user(&NewUser {
            id: "u2",
            username: "alice",
            email: "other@example.com",
            password_hash: "hash",
            role: "member",
        })
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn disabled_user_is_hidden_from_enabled_lookups() {
    let db = test_db().await;
    create_user(&db, "u1", "alice").await;

    assert!(db.find_enabled_user_by_username("alice").await.unwrap().is_some());
    assert!(db.set_user_enabled("u1", false).await.unwrap());

    assert!(db.find_enabled_user_by_username("alice").await.unwrap().is_none());
    assert!(db.find_enabled_user_by_id("u1").await.unwrap().is_none());
    // Still present, only disabled.
    assert!(!db.get_user("u1").await.unwrap().enabled);
}

#[tokio::test]
async fn unknown_role_is_rejected_by_schema() {
    let db = test_db().await;
    let result = db
        .create_user(&NewUser {
            id: "u1",
            username: "mallory",
            email: "m@example.com",
            password_hash: "hash",
            role: "superuser",
        })
        .await;
    assert!(result.is_err());
}

// === Catalog tests ===

#[tokio::test]
async fn units_are_counted_per_course() {
    let db = seeded_db(3).await;
    db.create_course("c2", "Empty", "lect").await.unwrap();

    assert_eq!(db.count_units_in_course("c1").await.unwrap(), 3);
    assert_eq!(db.count_units_in_course("c2").await.unwrap(), 0);
    assert_eq!(db.units_of("c1").await.unwrap(), vec!["v0", "v1", "v2"]);
}

#[tokio::test]
async fn unit_requires_existing_course() {
    let db = test_db().await;
    assert!(db.create_unit("v1", "missing", "Video", 0).await.is_err());
}

// === Revocation tests ===

#[tokio::test]
async fn revocation_insert_is_idempotent() {
    let db = test_db().await;

    assert!(db.insert_revoked_token("jti-1", "h", 2000, 1000).await.unwrap());
    assert!(!db.insert_revoked_token("jti-1", "h", 2000, 1001).await.unwrap());

    assert!(db.is_token_revoked("jti-1").await.unwrap());
    assert!(!db.is_token_revoked("jti-2").await.unwrap());

    let stored = db.get_revoked_token("jti-1").await.unwrap().unwrap();
    assert_eq!(stored.revoked_at, 1000);
}

#[tokio::test]
async fn prune_only_removes_expired_records() {
    let db = test_db().await;
    db.insert_revoked_token("old", "h1", 1500, 1000).await.unwrap();
    db.insert_revoked_token("live", "h2", 5000, 1000).await.unwrap();

    assert_eq!(db.prune_revoked_tokens(2000).await.unwrap(), 1);
    assert!(!db.is_token_revoked("old").await.unwrap());
    assert!(db.is_token_revoked("live").await.unwrap());
}

// === Watch fact tests ===

#[tokio::test]
async fn watch_fact_upsert_keeps_one_row() {
    let db = seeded_db(2).await;

    db.upsert_watch_fact("u1", "v0", true, 100).await.unwrap();
    db.upsert_watch_fact("u1", "v0", false, 200).await.unwrap();

    let fact = db.get_watch_fact("u1", "v0").await.unwrap().unwrap();
    assert!(!fact.watched);
    assert_eq!(fact.last_changed_at, 200);
    assert_eq!(db.count_watched_units("u1", "c1").await.unwrap(), 0);
}

#[tokio::test]
async fn watched_count_is_scoped_to_course() {
    let db = seeded_db(2).await;
    db.create_course("c2", "Other", "lect").await.unwrap();
    db.create_unit("w0", "c2", "Other video", 0).await.unwrap();

    db.upsert_watch_fact("u1", "v0", true, 100).await.unwrap();
    db.upsert_watch_fact("u1", "w0", true, 100).await.unwrap();

    assert_eq!(db.count_watched_units("u1", "c1").await.unwrap(), 1);
    assert_eq!(db.count_watched_units("u1", "c2").await.unwrap(), 1);
}

// === Enrollment tests ===

#[tokio::test]
async fn duplicate_enrollment_is_conflict() {
    let db = seeded_db(1).await;

    let enrollment = db.create_enrollment("u1", "c1", 100).await.unwrap();
    assert_eq!(enrollment.status(), EnrollmentStatus::InProgress);
    assert_eq!(enrollment.version, 0);

    let err = db.create_enrollment("u1", "c1", 101).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(db.list_enrollments("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn enrollment_count_snapshot() {
    let db = seeded_db(1).await;
    create_user(&db, "u2", "bob").await;

    db.create_enrollment("u1", "c1", 100).await.unwrap();
    db.create_enrollment("u2", "c1", 100).await.unwrap();

    assert_eq!(db.refresh_enrollment_count("c1").await.unwrap(), 2);
    assert_eq!(db.find_course("c1").await.unwrap().unwrap().enrolled_count, 2);
}

fn watch<'a>(unit_id: &'a str, certificate_id: &'a str, now: i64) -> ProgressWrite<'a> {
    ProgressWrite {
        user_id: "u1",
        course_id: "c1",
        watch: Some((unit_id, true)),
        certificate_id,
        now,
    }
}

#[tokio::test]
async fn progress_write_records_fact_and_bumps_version() {
    let db = seeded_db(4).await;
    db.create_enrollment("u1", "c1", 100).await.unwrap();

    let applied = db.apply_progress(&watch("v0", "cert-1", 200)).await.unwrap().unwrap();
    assert!((applied.enrollment.progress - 25.0).abs() < f64::EPSILON);
    assert_eq!(applied.enrollment.version, 1);
    assert_eq!(applied.enrollment.status(), EnrollmentStatus::InProgress);
    assert!(applied.certificate.is_none());
    assert!(db.get_watch_fact("u1", "v0").await.unwrap().unwrap().watched);

    // A recompute without a new fact still writes the same percentage.
    let again = db
        .apply_progress(&ProgressWrite { watch: None, ..watch("v0", "cert-1", 210) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.enrollment.version, 2);
    assert!((again.enrollment.progress - 25.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn completion_writes_enrollment_and_certificate_together() {
    let db = seeded_db(1).await;
    db.create_enrollment("u1", "c1", 100).await.unwrap();

    let applied = db.apply_progress(&watch("v0", "cert-1", 300)).await.unwrap().unwrap();
    assert!(applied.enrollment.is_completed());
    assert_eq!(applied.enrollment.completed_at, Some(300));
    assert_eq!(applied.certificate.unwrap().id, "cert-1");

    // Completed rows are final; the fact is still recorded.
    let unwatch = ProgressWrite {
        watch: Some(("v0", false)),
        ..watch("v0", "cert-2", 400)
    };
    assert!(db.apply_progress(&unwatch).await.unwrap().is_none());
    assert!(!db.get_watch_fact("u1", "v0").await.unwrap().unwrap().watched);

    let stored = db.find_enrollment("u1", "c1").await.unwrap().unwrap();
    assert!(stored.is_completed());
    assert_eq!(stored.completed_at, Some(300));
    assert_eq!(stored.version, 1);
    assert_eq!(db.find_certificate("u1", "c1").await.unwrap().unwrap().id, "cert-1");
    assert_eq!(db.count_certificates("u1", "c1").await.unwrap(), 1);
}

#[tokio::test]
async fn progress_write_without_enrollment_or_units_updates_nothing() {
    let db = seeded_db(1).await;
    assert!(db.apply_progress(&watch("v0", "cert-1", 300)).await.unwrap().is_none());
    assert!(db.find_certificate("u1", "c1").await.unwrap().is_none());

    let empty = seeded_db(0).await;
    empty.create_enrollment("u1", "c1", 100).await.unwrap();
    let recompute = ProgressWrite { watch: None, ..watch("v0", "cert-1", 300) };
    assert!(empty.apply_progress(&recompute).await.unwrap().is_none());
    assert_eq!(empty.find_enrollment("u1", "c1").await.unwrap().unwrap().version, 0);
}

// === Certificate tests ===

#[tokio::test]
async fn certificate_insert_is_unique_per_pair() {
    let db = seeded_db(1).await;

    assert!(db.insert_certificate_if_absent("cert-1", "u1", "c1", 300).await.unwrap());
    assert!(!db.insert_certificate_if_absent("cert-2", "u1", "c1", 400).await.unwrap());

    let cert = db.find_certificate("u1", "c1").await.unwrap().unwrap();
    assert_eq!(cert.id, "cert-1");
    assert_eq!(cert.issued_at, 300);
    assert_eq!(db.count_certificates("u1", "c1").await.unwrap(), 1);
}
