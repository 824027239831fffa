//! Version guard and bearer-token middleware.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use common::{test_config, TestApp};
use user_service::{
    models::{TokenKind, TokenRecord},
    services::{TokenCodec, UserStore},
};
use uuid::Uuid;

#[tokio::test]
async fn health_is_reachable_without_a_token() {
    let app = TestApp::spawn();

    let res = app.get("/api/v1/users/health", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "success");
    assert_eq!(res.body["message"], "The server is up and running smoothly.");
    assert!(res.body.get("data").is_none());
}

#[tokio::test]
async fn version_labels_are_normalized() {
    let app = TestApp::spawn();

    let res = app.get("/api/V2/users/health", None).await;

    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_version_is_rejected_before_auth() {
    let app = TestApp::spawn();

    // No token on a protected route: the version check still answers first.
    let res = app.get("/api/v9/users/permissions", None).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], "failure");
    assert_eq!(res.body["error"]["code"], "USR4000");
    assert_eq!(
        res.body["error"]["message"],
        "Given version is not supported by the system"
    );
}

#[tokio::test]
async fn protected_route_requires_a_token() {
    let app = TestApp::spawn();

    let res = app.get("/api/v1/users/permissions", None).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"]["code"], "USR600");
    assert_eq!(res.body["error"]["message"], "Missing Authorization token");
}

#[tokio::test]
async fn malformed_authorization_header_is_a_bad_request() {
    let app = TestApp::spawn();

    for value in ["Bearer", "Bearer a b", "just-a-token"] {
        let request = Request::builder()
            .uri("/api/v1/users/permissions")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap();

        let res = app.execute(request).await;

        assert_eq!(res.status, StatusCode::BAD_REQUEST, "header {:?}", value);
        assert_eq!(res.body["error"]["message"], "Invalid authorization format");
    }
}

#[tokio::test]
async fn garbage_token_is_unauthorized_even_on_exempt_routes() {
    let app = TestApp::spawn();

    let res = app.get("/api/v1/users/health", Some("not-a-jwt")).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"]["code"], "USR600");
}

#[tokio::test]
async fn expired_access_token_gets_498() {
    let app = TestApp::spawn();
    let session = app.signed_in("ada@example.com").await;
    let user_id: Uuid = session.user_id.parse().unwrap();

    let codec = TokenCodec::new(&test_config().jwt);
    let now = Utc::now();
    let expires_at = now - Duration::seconds(1);
    let issued = codec
        .issue(TokenKind::Access, Some(user_id), "ada@example.com", expires_at, None)
        .unwrap();
    app.store
        .insert_tokens(&[TokenRecord::new(
            issued.claims.jti,
            Some(user_id),
            &issued.token,
            TokenKind::Access,
            now - Duration::minutes(16),
            expires_at,
        )])
        .await
        .unwrap();

    let res = app
        .get("/api/v1/users/token/validate", Some(&issued.token))
        .await;

    assert_eq!(res.status.as_u16(), 498);
    assert_eq!(res.body["error"]["code"], "USR4020");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_unauthorized() {
    let app = TestApp::spawn();
    let mut jwt = test_config().jwt;
    jwt.secret_key = "some-other-secret-that-is-long-enough".to_string();
    let forged = TokenCodec::new(&jwt)
        .issue(
            TokenKind::Access,
            Some(Uuid::new_v4()),
            "mallory@example.com",
            Utc::now() + Duration::minutes(15),
            None,
        )
        .unwrap();

    let res = app
        .get("/api/v1/users/token/validate", Some(&forged.token))
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
