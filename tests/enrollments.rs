mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::common::{TestDatabase, promote, setup_server, setup_test_db};

async fn signup(server: &mut TestServer, username: &str, password: &str) -> Value {
    server.save_cookies();
    let resp = server
        .post("/api/v1/account/signup")
        .json(&json!({"username": username, "password": password}))
        .await;
    resp.assert_status_ok();
    resp.json()
}

/// Creates a published course with one section and the given lecture durations,
/// authored by a fresh instructor account. Leaves the instructor signed in;
/// returns `(course_id, lecture_ids)`.
async fn published_course(
    server: &mut TestServer,
    db: &TestDatabase,
    instructor: &str,
    title: &str,
    category: &str,
    durations: &[i32],
) -> (String, Vec<String>) {
    server.clear_cookies();
    signup(server, instructor, "secret").await;
    promote(db, instructor, "instructor").await;

    let resp = server
        .post("/api/v1/courses/")
        .json(&json!({
            "title": title,
            "description": "a course",
            "category": category,
            "level": "Beginner",
            "price": 10.0,
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let course: Value = resp.json();
    let course_id = course["id"].as_str().unwrap().to_string();

    let resp = server
        .post(&format!("/api/v1/courses/{course_id}/sections"))
        .json(&json!({"title": "Main"}))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let body: Value = resp.json();
    let section_id = body["sections"][0]["id"].as_str().unwrap().to_string();

    let mut lecture_ids = Vec::new();
    for (i, duration) in durations.iter().enumerate() {
        let resp = server
            .post(&format!(
                "/api/v1/courses/{course_id}/sections/{section_id}/lectures"
            ))
            .json(&json!({
                "title": format!("lecture {i}"),
                "video_ref": "vid://clip",
                "duration_minutes": duration,
            }))
            .await;
        resp.assert_status(StatusCode::CREATED);
        let body: Value = resp.json();
        let lectures = body["sections"][0]["lectures"].as_array().unwrap();
        lecture_ids.push(lectures[i]["id"].as_str().unwrap().to_string());
    }

    server
        .post(&format!("/api/v1/courses/{course_id}/publish"))
        .await
        .assert_status_ok();

    (course_id, lecture_ids)
}

async fn enroll(server: &mut TestServer, course_id: &str) -> Value {
    let resp = server.post(&format!("/api/v1/enrollments/{course_id}")).await;
    resp.assert_status(StatusCode::CREATED);
    resp.json()
}

async fn complete(server: &mut TestServer, enrollment_id: &str, lecture_id: &str) -> Value {
    let resp = server
        .post(&format!(
            "/api/v1/enrollments/{enrollment_id}/lectures/{lecture_id}/complete"
        ))
        .json(&json!({"watch_time_seconds": 60}))
        .await;
    resp.assert_status_ok();
    resp.json()
}

async fn course_enrollment_count(server: &mut TestServer, course_id: &str) -> i64 {
    let resp = server.get(&format!("/api/v1/courses/{course_id}")).await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    body["course"]["enrollment_count"].as_i64().unwrap()
}

#[tokio::test]
async fn enroll_rules() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    server.clear_cookies();
    signup(&mut server, "prof", "secret").await;
    promote(&db, "prof", "instructor").await;
    let resp = server
        .post("/api/v1/courses/")
        .json(&json!({
            "title": "Still a Draft",
            "description": "d",
            "category": "Misc",
            "level": "Beginner",
            "price": 0.0,
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let draft: Value = resp.json();
    let draft_id = draft["id"].as_str().unwrap().to_string();

    let (course_id, _) =
        published_course(&mut server, &db, "prof2", "Open for Business", "Misc", &[10]).await;

    server.clear_cookies();
    signup(&mut server, "student", "secret").await;

    // missing course
    server
        .post(&format!("/api/v1/enrollments/{}", Uuid::new_v4()))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // unpublished course
    server
        .post(&format!("/api/v1/enrollments/{draft_id}"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let enrollment = enroll(&mut server, &course_id).await;
    assert_eq!(enrollment["progress"], 0);
    assert_eq!(enrollment["is_completed"], false);
    assert_eq!(course_enrollment_count(&mut server, &course_id).await, 1);

    // one enrollment per (user, course)
    server
        .post(&format!("/api/v1/enrollments/{course_id}"))
        .await
        .assert_status(StatusCode::CONFLICT);
    assert_eq!(course_enrollment_count(&mut server, &course_id).await, 1);

    // unenroll puts the counter back
    let enrollment_id = enrollment["id"].as_str().unwrap();
    server
        .delete(&format!("/api/v1/enrollments/{enrollment_id}"))
        .await
        .assert_status_ok();
    assert_eq!(course_enrollment_count(&mut server, &course_id).await, 0);
}

#[tokio::test]
async fn four_lecture_progress_walkthrough() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    let (course_id, lectures) =
        published_course(&mut server, &db, "prof", "Stepwise", "Misc", &[5, 5, 5, 5]).await;

    server.clear_cookies();
    signup(&mut server, "student", "secret").await;
    let enrollment = enroll(&mut server, &course_id).await;
    let id = enrollment["id"].as_str().unwrap().to_string();

    let body = complete(&mut server, &id, &lectures[0]).await;
    assert_eq!(body["progress"], 25);
    assert_eq!(body["is_completed"], false);
    assert!(body["completed_at"].is_null());
    assert_eq!(body["last_accessed_lecture"].as_str().unwrap(), lectures[0]);

    complete(&mut server, &id, &lectures[1]).await;
    let body = complete(&mut server, &id, &lectures[2]).await;
    assert_eq!(body["progress"], 75);
    assert_eq!(body["is_completed"], false);

    let body = complete(&mut server, &id, &lectures[3]).await;
    assert_eq!(body["progress"], 100);
    assert_eq!(body["is_completed"], true);
    assert!(body["completed_at"].is_string());
    assert_eq!(body["completed_lectures"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn complete_lecture_is_idempotent() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    let (course_id, lectures) =
        published_course(&mut server, &db, "prof", "Repeatable", "Misc", &[5, 5, 5]).await;

    server.clear_cookies();
    signup(&mut server, "student", "secret").await;
    let enrollment = enroll(&mut server, &course_id).await;
    let id = enrollment["id"].as_str().unwrap().to_string();

    let first = complete(&mut server, &id, &lectures[0]).await;
    assert_eq!(first["progress"], 33);

    // the set and the percentage are untouched on replay
    let second = complete(&mut server, &id, &lectures[0]).await;
    assert_eq!(
        second["completed_lectures"].as_array().unwrap().len(),
        first["completed_lectures"].as_array().unwrap().len()
    );
    assert_eq!(second["progress"], first["progress"]);
    assert_eq!(second["last_accessed_lecture"].as_str().unwrap(), lectures[0]);
}

#[tokio::test]
async fn completion_latch_survives_course_growth() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    let (course_id, lectures) =
        published_course(&mut server, &db, "prof", "Growing", "Misc", &[10]).await;

    server.clear_cookies();
    signup(&mut server, "student", "secret").await;
    let enrollment = enroll(&mut server, &course_id).await;
    let id = enrollment["id"].as_str().unwrap().to_string();

    let body = complete(&mut server, &id, &lectures[0]).await;
    assert_eq!(body["progress"], 100);
    assert_eq!(body["is_completed"], true);
    let stamp = body["completed_at"].as_str().unwrap().to_string();

    // the instructor adds more content after the fact
    server.clear_cookies();
    let resp = server
        .post("/api/v1/account/signin")
        .json(&json!({"username": "prof", "password": "secret"}))
        .await;
    resp.assert_status_ok();
    let resp = server.get(&format!("/api/v1/courses/{course_id}")).await;
    let course: Value = resp.json();
    let section_id = course["course"]["sections"][0]["id"].as_str().unwrap();
    let resp = server
        .post(&format!(
            "/api/v1/courses/{course_id}/sections/{section_id}/lectures"
        ))
        .json(&json!({
            "title": "late addition",
            "video_ref": "vid://clip",
            "duration_minutes": 10,
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let course: Value = resp.json();
    let new_lecture = course["sections"][0]["lectures"][1]["id"].as_str().unwrap();

    // latched: completing the new lecture records it but never re-derives
    server.clear_cookies();
    let resp = server
        .post("/api/v1/account/signin")
        .json(&json!({"username": "student", "password": "secret"}))
        .await;
    resp.assert_status_ok();
    let body = complete(&mut server, &id, new_lecture).await;
    assert_eq!(body["progress"], 100);
    assert_eq!(body["is_completed"], true);
    assert_eq!(body["completed_at"].as_str().unwrap(), stamp);
    assert_eq!(body["completed_lectures"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_course_progress_stays_zero() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    // published but without any lectures
    let (course_id, _) = published_course(&mut server, &db, "prof", "Hollow", "Misc", &[]).await;

    server.clear_cookies();
    signup(&mut server, "student", "secret").await;
    let enrollment = enroll(&mut server, &course_id).await;
    let id = enrollment["id"].as_str().unwrap().to_string();

    let body = complete(&mut server, &id, &Uuid::new_v4().to_string()).await;
    assert_eq!(body["progress"], 0);
    assert_eq!(body["is_completed"], false);
}

#[tokio::test]
async fn ledger_is_owner_only() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    let (course_id, lectures) =
        published_course(&mut server, &db, "prof", "Private", "Misc", &[5]).await;

    server.clear_cookies();
    signup(&mut server, "alice", "secret").await;
    let enrollment = enroll(&mut server, &course_id).await;
    let id = enrollment["id"].as_str().unwrap().to_string();

    // bob can see none of it
    server.clear_cookies();
    signup(&mut server, "bob", "secret").await;

    server
        .get(&format!("/api/v1/enrollments/{id}"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .post(&format!(
            "/api/v1/enrollments/{id}/lectures/{}/complete",
            lectures[0]
        ))
        .json(&json!({"watch_time_seconds": 1}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .post(&format!("/api/v1/enrollments/{id}/notes"))
        .json(&json!({"lecture_id": lectures[0], "content": "sneaky"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // an admin may inspect and remove, but the progress itself stays personal
    server.clear_cookies();
    signup(&mut server, "root", "root").await;
    promote(&db, "root", "admin").await;

    server
        .get(&format!("/api/v1/enrollments/{id}"))
        .await
        .assert_status_ok();
    server
        .post(&format!(
            "/api/v1/enrollments/{id}/lectures/{}/complete",
            lectures[0]
        ))
        .json(&json!({"watch_time_seconds": 1}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .delete(&format!("/api/v1/enrollments/{id}"))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn notes_crud() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    let (course_id, lectures) =
        published_course(&mut server, &db, "prof", "Notable", "Misc", &[5]).await;

    server.clear_cookies();
    signup(&mut server, "student", "secret").await;
    let enrollment = enroll(&mut server, &course_id).await;
    let id = enrollment["id"].as_str().unwrap().to_string();

    // content limits
    server
        .post(&format!("/api/v1/enrollments/{id}/notes"))
        .json(&json!({"lecture_id": lectures[0], "content": "  "}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post(&format!("/api/v1/enrollments/{id}/notes"))
        .json(&json!({"lecture_id": lectures[0], "content": "x".repeat(2001)}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // timestamp defaults to zero when not given
    let resp = server
        .post(&format!("/api/v1/enrollments/{id}/notes"))
        .json(&json!({"lecture_id": lectures[0], "content": "check this part"}))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let body: Value = resp.json();
    assert_eq!(body["notes"][0]["timestamp_seconds"], 0);
    let note_id = body["notes"][0]["id"].as_str().unwrap().to_string();

    let resp = server
        .post(&format!("/api/v1/enrollments/{id}/notes"))
        .json(&json!({
            "lecture_id": lectures[0],
            "content": "and this",
            "timestamp_seconds": 90,
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);

    let resp = server.get(&format!("/api/v1/enrollments/{id}/notes")).await;
    resp.assert_status_ok();
    let notes: Value = resp.json();
    assert_eq!(notes.as_array().unwrap().len(), 2);

    let resp = server
        .put(&format!("/api/v1/enrollments/{id}/notes/{note_id}"))
        .json(&json!({"content": "reworded"}))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["notes"][0]["content"], "reworded");

    // unknown note id
    server
        .put(&format!("/api/v1/enrollments/{id}/notes/{}", Uuid::new_v4()))
        .json(&json!({"content": "nope"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .delete(&format!("/api/v1/enrollments/{id}/notes/{note_id}"))
        .await
        .assert_status_ok();
    server
        .delete(&format!("/api/v1/enrollments/{id}/notes/{note_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_filters_and_analytics() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    let (rust_course, rust_lectures) =
        published_course(&mut server, &db, "prof1", "Rust Basics", "Programming", &[5, 5]).await;
    let (go_course, go_lectures) =
        published_course(&mut server, &db, "prof2", "Go Basics", "Programming", &[5, 5]).await;
    let (art_course, _) =
        published_course(&mut server, &db, "prof3", "Watercolors", "Art", &[5, 5]).await;

    server.clear_cookies();
    signup(&mut server, "student", "secret").await;

    let rust_enr = enroll(&mut server, &rust_course).await;
    let go_enr = enroll(&mut server, &go_course).await;
    enroll(&mut server, &art_course).await;

    // finish the rust course, get halfway through go
    let rust_id = rust_enr["id"].as_str().unwrap().to_string();
    complete(&mut server, &rust_id, &rust_lectures[0]).await;
    complete(&mut server, &rust_id, &rust_lectures[1]).await;
    let go_id = go_enr["id"].as_str().unwrap().to_string();
    complete(&mut server, &go_id, &go_lectures[0]).await;

    let resp = server.get("/api/v1/enrollments/").await;
    resp.assert_status_ok();
    let all: Value = resp.json();
    assert_eq!(all.as_array().unwrap().len(), 3);
    // most recently accessed first
    assert_eq!(all[0]["course_title"], "Go Basics");

    let resp = server
        .get("/api/v1/enrollments/")
        .add_query_param("status", "completed")
        .await;
    let completed: Value = resp.json();
    assert_eq!(completed.as_array().unwrap().len(), 1);
    assert_eq!(completed[0]["course_title"], "Rust Basics");

    let resp = server
        .get("/api/v1/enrollments/")
        .add_query_param("status", "in-progress")
        .await;
    let in_progress: Value = resp.json();
    assert_eq!(in_progress.as_array().unwrap().len(), 2);

    let resp = server.get("/api/v1/enrollments/analytics").await;
    resp.assert_status_ok();
    let analytics: Value = resp.json();
    assert_eq!(analytics["overview"]["total_courses"], 3);
    assert_eq!(analytics["overview"]["completed_courses"], 1);
    assert_eq!(analytics["overview"]["in_progress_courses"], 2);
    assert_eq!(analytics["overview"]["total_lectures_completed"], 3);
    // (100 + 50 + 0) / 3 = 50
    assert_eq!(analytics["overview"]["average_progress"], 50);
    assert_eq!(analytics["category_breakdown"]["Programming"]["total"], 2);
    assert_eq!(analytics["category_breakdown"]["Programming"]["completed"], 1);
    assert_eq!(analytics["category_breakdown"]["Art"]["total"], 1);
    assert_eq!(analytics["recent_activity"].as_array().unwrap().len(), 3);
}
