pub mod config;
pub mod db;
pub mod dispatch;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::UserConfig;
use crate::dispatch::{AcceptedVersions, Registry};
use crate::handlers::{operations, versioned, Endpoint};
use crate::middleware::{authorize, version_guard};
use crate::services::{
    AuthService, Mailer, PermissionService, TokenCodec, TokenLifetimes, UserService, UserStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<UserConfig>,
    pub store: Arc<dyn UserStore>,
    pub auth: AuthService,
    pub permissions: PermissionService,
    pub users: UserService,
    pub registry: Arc<Registry<Endpoint>>,
}

impl AppState {
    /// Wire the services around `store` and `mailer` and build the version
    /// registry. Fails when some accepted version cannot serve an operation.
    pub fn new(
        config: UserConfig,
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, AppError> {
        let codec = TokenCodec::new(&config.jwt);
        let lifetimes = TokenLifetimes::from_config(&config.jwt);

        let auth = AuthService::new(
            store.clone(),
            mailer.clone(),
            codec.clone(),
            lifetimes,
            config.links.clone(),
        );
        let permissions = PermissionService::new(
            store.clone(),
            mailer,
            codec,
            lifetimes,
            config.links.clone(),
        );
        let users = UserService::new(store.clone());

        let registry = handlers::registry(AcceptedVersions::new(&config.accepted_versions))
            .map_err(|e| AppError::ConfigError(e.into()))?;

        Ok(Self {
            config: Arc::new(config),
            store,
            auth,
            permissions,
            users,
            registry: Arc::new(registry),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    use operations::*;

    let api = Router::new()
        .route("/api/:version/users/health", get(versioned(HEALTH)))
        .route("/api/:version/users/signin", post(versioned(SIGNIN)))
        .route("/api/:version/users/signup", post(versioned(SIGNUP)))
        .route(
            "/api/:version/users/token/validate",
            get(versioned(TOKEN_VALIDATION)),
        )
        .route(
            "/api/:version/users/permissions",
            put(versioned(ADD_USER_PERMISSIONS)).get(versioned(LIST_ALL_PERMISSIONS)),
        )
        .route(
            "/api/:version/users/refresh-token",
            post(versioned(REFRESH_TOKEN)),
        )
        .route("/api/:version/users", get(versioned(LIST_USERS)))
        .route("/api/:version/users/", get(versioned(LIST_USERS)))
        .route(
            "/api/:version/users/forgot-password",
            post(versioned(FORGOT_PASSWORD)),
        )
        .route(
            "/api/:version/users/reset-password",
            post(versioned(RESET_PASSWORD)),
        )
        .route(
            "/api/:version/users/projects/:project_id/users/:user_id/permissions",
            get(versioned(LIST_USER_PERMISSIONS)),
        )
        // Runs after the version guard.
        .route_layer(from_fn_with_state(state.clone(), authorize))
        .route_layer(from_fn_with_state(state.clone(), version_guard));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ORIGIN,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(12 * 60 * 60));

    let timeout = Duration::from_secs(state.config.request_timeout_seconds);

    api.with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}
