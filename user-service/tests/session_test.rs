//! Signup, signin, token validation and refresh over HTTP.

mod common;

use axum::http::StatusCode;
use common::{signup_body, TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn signup_returns_created_user_without_hash() {
    let app = TestApp::spawn();

    let res = app.signup("Ada Lovelace", "ada@example.com").await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["message"], "User signup successfully");
    let user = &res.body["data"]["user"];
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["purpose"], "developer");
    assert!(user.get("password_hash").is_none());
    assert!(res.body["data"].get("token").is_none());

    let welcome = app.mailer.messages();
    assert_eq!(welcome.len(), 1);
    assert_eq!(welcome[0].to, vec!["ada@example.com".to_string()]);
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = TestApp::spawn();
    app.signup("Ada Lovelace", "ada@example.com").await;

    let res = app.signup("Ada Again", "ada@example.com").await;

    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["error"]["code"], "USR4011");
}

#[tokio::test]
async fn invalid_signup_reports_every_field() {
    let app = TestApp::spawn();
    let mut body = signup_body("A", "not-an-email");
    body["confirm_password"] = json!("Different!1");

    let res = app.post("/api/v1/users/signup", None, body).await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["error"]["code"], "USR4000");
    let fields: Vec<&str> = res.body["error"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"confirm_password"));
}

#[tokio::test]
async fn signin_issues_access_and_refresh_tokens() {
    let app = TestApp::spawn();
    app.signup("Ada Lovelace", "ada@example.com").await;

    let res = app
        .post(
            "/api/v1/users/signin",
            None,
            json!({ "mail_id": "ada@example.com", "password": PASSWORD }),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Signin Successful");
    let token = &res.body["data"]["token"];
    assert!(token["access_token"].is_string());
    assert!(token["refresh_token"].is_string());
    assert_ne!(token["access_token"], token["refresh_token"]);

    let access_expiry: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(token["access_token_expiry"].clone()).unwrap();
    let refresh_expiry: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(token["refresh_token_expiry"].clone()).unwrap();
    assert!(access_expiry < refresh_expiry);
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = TestApp::spawn();
    app.signup("Ada Lovelace", "ada@example.com").await;

    let wrong_password = app
        .post(
            "/api/v1/users/signin",
            None,
            json!({ "mail_id": "ada@example.com", "password": "Wr0ng!pass" }),
        )
        .await;
    let unknown_email = app
        .post(
            "/api/v1/users/signin",
            None,
            json!({ "mail_id": "nobody@example.com", "password": PASSWORD }),
        )
        .await;

    for res in [wrong_password, unknown_email] {
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"]["code"], "USR4025");
    }
}

#[tokio::test]
async fn validate_returns_user_id() {
    let app = TestApp::spawn();
    let session = app.signed_in("ada@example.com").await;

    let res = app
        .get("/api/v1/users/token/validate", Some(&session.access_token))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Token validation successful");
    assert_eq!(res.body["data"]["user_id"], session.user_id.as_str());
}

#[tokio::test]
async fn refresh_token_cannot_be_used_as_access_token() {
    let app = TestApp::spawn();
    let session = app.signed_in("ada@example.com").await;

    let res = app
        .get("/api/v1/users/token/validate", Some(&session.refresh_token))
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_issues_new_access_token() {
    let app = TestApp::spawn();
    let session = app.signed_in("ada@example.com").await;

    let res = app
        .post(
            "/api/v1/users/refresh-token",
            None,
            json!({ "refresh_token": session.refresh_token }),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Token refresh successful");
    let token = &res.body["data"]["token"];
    assert_eq!(token["refresh_token"], session.refresh_token.as_str());
    let access = token["access_token"].as_str().unwrap();
    assert_ne!(access, session.access_token);

    let res = app.get("/api/v1/users/token/validate", Some(access)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn access_token_cannot_refresh() {
    let app = TestApp::spawn();
    let session = app.signed_in("ada@example.com").await;

    let res = app
        .post(
            "/api/v1/users/refresh-token",
            None,
            json!({ "refresh_token": session.access_token }),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_users_pages_with_metadata() {
    let app = TestApp::spawn();
    let session = app.signed_in("ada@example.com").await;
    app.signup("Grace Hopper", "grace@example.com").await;
    app.signup("Alan Turing", "alan@example.com").await;

    let res = app
        .get("/api/v1/users?limit=2", Some(&session.access_token))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["user"].as_array().unwrap().len(), 2);
    let meta = &res.body["data"]["meta_data"];
    assert_eq!(meta["total"], 3);
    assert_eq!(meta["next"], 2);
}

#[tokio::test]
async fn list_users_rejects_bad_paging() {
    let app = TestApp::spawn();
    let session = app.signed_in("ada@example.com").await;

    let res = app
        .get("/api/v1/users/?limit=500", Some(&session.access_token))
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["error"]["code"], "USR4000");
}

#[tokio::test]
async fn refresh_body_errors_keep_the_failure_envelope() {
    let app = TestApp::spawn();

    let missing = app
        .post("/api/v1/users/refresh-token", None, json!({}))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["status"], "failure");
    assert_eq!(missing.body["error"]["code"], "USR4000");

    let empty = app
        .post(
            "/api/v1/users/refresh-token",
            None,
            json!({ "refresh_token": "" }),
        )
        .await;
    assert_eq!(empty.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(empty.body["error"]["fields"][0]["field"], "refresh_token");
}
