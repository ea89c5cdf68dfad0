mod common;
use axum::http::StatusCode;
use lectern::model::entity::UserEntity;
use lectern::web::middlewares::AUTH_TOKEN;
use serde_json::json;
use tower_cookies::cookie::SameSite;

use crate::common::{
    Action, Flow, promote, setup_server, setup_test_db, signin_action, signup_action,
};

#[tokio::test]
async fn route_signup_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(
            signup_action("foobar", "foobaz")
                .assert_cookie(AUTH_TOKEN, |cookie| {
                    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
                    assert_eq!(cookie.path(), Some("/"));
                    assert_eq!(cookie.http_only(), Some(true));
                })
                .assert_body(|body| {
                    let ent: UserEntity = serde_json::from_str(body).expect("Invalid body format");
                    assert_eq!(ent.username(), "foobar");
                })
                .with_expect(StatusCode::OK),
        )
        // try to signup twice
        .step(signup_action("foobar", "foobaz").with_expect(StatusCode::CONFLICT))
        .run(&mut server, &db)
        .await;
}

#[tokio::test]
async fn route_signin_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(signup_action("SIGNINTEST", "SIGNINTEST").with_save_cookies(false))
        .step(
            signin_action("SIGNINTEST", "SIGNINTEST")
                .assert_cookie(AUTH_TOKEN, |cookie| {
                    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
                    assert_eq!(cookie.path(), Some("/"));
                    assert_eq!(cookie.http_only(), Some(true));
                })
                .assert_body(|body| {
                    let ent: UserEntity = serde_json::from_str(body).expect("Invalid JSON format");
                    assert_eq!(ent.username(), "SIGNINTEST");
                })
                .with_expect(StatusCode::OK)
                .with_clear_cookies(true),
        )
        // wrong credentials
        .step(
            signin_action("SIGNINTEST", "WRONGPASSWORD")
                .with_save_cookies(false)
                .with_clear_cookies(true)
                .assert_body(|body| {
                    assert!(body.contains("Authentication error"));
                })
                .with_expect(StatusCode::UNAUTHORIZED),
        )
        // non-existing account
        .step(
            signin_action("nonexisting", "nvm")
                .with_expect(StatusCode::UNAUTHORIZED)
                .assert_body(|body| assert!(body.contains("Authentication error"))),
        )
        .run(&mut server, &db)
        .await;
}

#[tokio::test]
async fn route_user_list_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(signup_action("FOOBAR", "FOOBAZ").with_save_cookies(true))
        // plain students cannot page through accounts
        .step(
            Action::new("user_list", "GET", "/api/v1/account/page")
                .assert_body(|body| {
                    assert!(body.contains("error"));
                })
                .with_param("limit", "5")
                .with_param("offset", "0")
                .with_expect(StatusCode::FORBIDDEN)
                .with_save_cookies(true),
        )
        .run(&mut server, &db)
        .await;

    promote(&db, "FOOBAR", "admin").await;

    Flow::new()
        .step(
            Action::new("user_list", "GET", "/api/v1/account/page")
                .with_param("limit", "5")
                .with_param("offset", "0")
                .assert_body(|body| {
                    assert!(body.contains("total"));
                    assert!(body.contains("items"));
                })
                .with_expect(StatusCode::OK),
        )
        .run(&mut server, &db)
        .await;
}

#[tokio::test]
async fn route_user_update_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        // create a pair of users and save their data to `foobar_user` and `foobar2_user`
        .step(
            signup_action("FOOBAR", "FOOBAZ")
                .with_save_cookies(false)
                .with_save_as("foobar_user"),
        )
        .step(
            signup_action("FOOBAR2", "FOOBAZ2")
                .with_save_cookies(true)
                .with_save_as("foobar2_user"),
        )
        // try to update `foobar_user` without permissions
        .step(
            Action::new("user_update", "PUT", "dynamic")
                .with_dyn_path(|ctx| {
                    let user: UserEntity = ctx.get_json("foobar_user");
                    format!("/api/v1/account/{}", user.id())
                })
                .with_body(json!({
                    "username": "should fail",
                    "password": "should fail",
                }))
                .with_expect(StatusCode::FORBIDDEN)
                .assert_body(|body| {
                    assert!(body.contains("error"));
                }),
        )
        // update self, this one should work
        .step(
            Action::new("user_update", "PUT", "dynamic")
                .with_dyn_path(|ctx| {
                    let user: UserEntity = ctx.get_json("foobar2_user");
                    format!("/api/v1/account/{}", user.id())
                })
                .with_body(json!({
                    "username": "FOOBAR3",
                    "password": "unused",
                }))
                .with_expect(StatusCode::OK)
                .assert_body(|body| {
                    let ent: UserEntity = serde_json::from_str(body).expect("Invalid body format");
                    assert_eq!(ent.username(), "FOOBAR3");
                }),
        )
        .run(&mut server, &db)
        .await;
}

#[tokio::test]
async fn route_user_delete_archives_courses_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;
    server.save_cookies();

    // an instructor with one published course
    let resp = server
        .post("/api/v1/account/signup")
        .json(&json!({"username": "prof", "password": "prof"}))
        .await;
    resp.assert_status_ok();
    let prof: UserEntity = resp.json();
    promote(&db, "prof", "instructor").await;

    let resp = server
        .post("/api/v1/courses/")
        .json(&json!({
            "title": "Soon Gone",
            "description": "d",
            "category": "Misc",
            "level": "Beginner",
            "price": 0.0,
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let course: serde_json::Value = resp.json();
    let course_id = course["id"].as_str().unwrap().to_string();

    server
        .post(&format!("/api/v1/courses/{course_id}/publish"))
        .await
        .assert_status_ok();

    // deleting the account archives the course instead of dropping it
    server
        .delete(&format!("/api/v1/account/{}", prof.id()))
        .await
        .assert_status_ok();

    let (status, is_published): (String, bool) =
        sqlx::query_as("SELECT status, is_published FROM courses WHERE id = $1::uuid")
            .bind(&course_id)
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(status, "archived");
    assert!(!is_published);
}
