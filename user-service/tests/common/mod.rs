//! Shared setup for user-service integration tests.
//!
//! The router runs in-process over an in-memory store and a recording
//! mailer, so these tests need no database or SMTP relay.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use service_core::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use user_service::{
    build_router,
    config::UserConfig,
    services::{MemoryStore, RecordingMailer},
    AppState,
};

pub const PASSWORD: &str = "Str0ng!pass";

pub fn test_config() -> UserConfig {
    let env = HashMap::from([
        ("DATABASE_URL", "postgres://localhost/users_test"),
        ("JWT_SECRET_KEY", "integration-test-secret-0123456789abcdef"),
        ("ACCEPTED_VERSIONS", "v1,v2"),
        ("GMAIL_USER", "noreply@example.com"),
        ("GMAIL_APP_PASSWORD", "app-password"),
        ("SERVICE_NAME", "user-service-test"),
        ("SIGNUP_URL", "https://app.example.com/signup"),
        ("RESET_PASSWORD_URL", "https://app.example.com/reset"),
    ]);
    let common = Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        shutdown_grace_seconds: 0,
    };

    UserConfig::from_lookup(common, |key| env.get(key).map(|v| v.to_string()))
        .expect("Failed to build test config")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// In-process application with direct access to its store and mailbox.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let state = AppState::new(test_config(), store.clone(), mailer.clone())
            .expect("Failed to build app state");
        let router = build_router(state.clone());

        Self {
            router,
            state,
            store,
            mailer,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("Failed to build request");

        self.execute(request).await
    }

    pub async fn execute(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response body is not JSON")
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, bearer, None).await
    }

    pub async fn post(&self, uri: &str, bearer: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, bearer, Some(body)).await
    }

    pub async fn put(&self, uri: &str, bearer: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, bearer, Some(body)).await
    }

    pub async fn signup(&self, name: &str, email: &str) -> TestResponse {
        self.post("/api/v1/users/signup", None, signup_body(name, email))
            .await
    }

    /// Sign up `email` and return the session tokens.
    pub async fn signed_in(&self, email: &str) -> SignedIn {
        let res = self.signup("Ada Lovelace", email).await;
        assert_eq!(res.status, StatusCode::CREATED, "signup failed: {}", res.body);

        let res = self
            .post(
                "/api/v1/users/signin",
                None,
                json!({ "mail_id": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "signin failed: {}", res.body);

        let token = &res.body["data"]["token"];
        SignedIn {
            user_id: res.body["data"]["user"]["id"]
                .as_str()
                .expect("user id")
                .to_string(),
            access_token: token["access_token"]
                .as_str()
                .expect("access token")
                .to_string(),
            refresh_token: token["refresh_token"]
                .as_str()
                .expect("refresh token")
                .to_string(),
        }
    }
}

pub struct SignedIn {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn signup_body(name: &str, email: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "password": PASSWORD,
        "confirm_password": PASSWORD,
        "purpose": "developer",
        "organization": "Analytical Engines",
    })
}

/// Value of the `token` query parameter in a mailed link.
pub fn token_from_link(link: &str) -> String {
    link.split("token=")
        .nth(1)
        .expect("link carries a token")
        .to_string()
}
