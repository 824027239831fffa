//! HTTP handlers and the version-aware dispatch that selects them.

pub mod password;
pub mod permissions;
pub mod session;
pub mod users;

use axum::{
    extract::{Request, State},
    handler::Handler,
    response::{IntoResponse, Response},
};
use futures::future::{BoxFuture, FutureExt};
use service_core::error::AppError;
use std::sync::Arc;

use crate::{
    dispatch::{AcceptedVersions, Registry, RegistryError},
    middleware::RequestedVersion,
    AppState,
};

/// Operation names resolved through the version registry.
pub mod operations {
    pub const HEALTH: &str = "HealthHandler";
    pub const SIGNIN: &str = "Signin";
    pub const SIGNUP: &str = "Signup";
    pub const TOKEN_VALIDATION: &str = "TokenValidation";
    pub const ADD_USER_PERMISSIONS: &str = "AddUserPermissions";
    pub const LIST_ALL_PERMISSIONS: &str = "ListAllPermissions";
    pub const REFRESH_TOKEN: &str = "RefreshToken";
    pub const LIST_USERS: &str = "ListUsers";
    pub const FORGOT_PASSWORD: &str = "ForgotPassword";
    pub const RESET_PASSWORD: &str = "ResetPassword";
    pub const LIST_USER_PERMISSIONS: &str = "ListUserPermissions";

    pub const ALL: &[&str] = &[
        HEALTH,
        SIGNIN,
        SIGNUP,
        TOKEN_VALIDATION,
        ADD_USER_PERMISSIONS,
        LIST_ALL_PERMISSIONS,
        REFRESH_TOKEN,
        LIST_USERS,
        FORGOT_PASSWORD,
        RESET_PASSWORD,
        LIST_USER_PERMISSIONS,
    ];
}

/// Type-erased axum handler stored in the registry.
pub type Endpoint = Arc<dyn Fn(AppState, Request) -> BoxFuture<'static, Response> + Send + Sync>;

pub fn endpoint<H, T>(handler: H) -> Endpoint
where
    H: Handler<T, AppState> + Sync,
    T: 'static,
{
    Arc::new(move |state: AppState, req: Request| handler.clone().call(req, state).boxed())
}

/// Registry with every operation bound for every accepted version.
/// Version-specific overrides are registered here with `register`.
pub fn registry(versions: AcceptedVersions) -> Result<Registry<Endpoint>, RegistryError> {
    use operations::*;

    let mut registry = Registry::new(versions);
    registry
        .register_default(HEALTH, endpoint(session::health))
        .register_default(SIGNIN, endpoint(session::signin))
        .register_default(SIGNUP, endpoint(session::signup))
        .register_default(TOKEN_VALIDATION, endpoint(session::validate_token))
        .register_default(ADD_USER_PERMISSIONS, endpoint(permissions::grant_permissions))
        .register_default(LIST_ALL_PERMISSIONS, endpoint(permissions::list_permissions))
        .register_default(REFRESH_TOKEN, endpoint(session::refresh))
        .register_default(LIST_USERS, endpoint(users::list_users))
        .register_default(FORGOT_PASSWORD, endpoint(password::forgot_password))
        .register_default(RESET_PASSWORD, endpoint(password::reset_password))
        .register_default(LIST_USER_PERMISSIONS, endpoint(permissions::list_user_permissions));

    registry.ensure_complete(ALL)?;
    Ok(registry)
}

/// Route handler that runs whichever endpoint the registry resolves for the
/// caller's version.
pub fn versioned(
    operation: &'static str,
) -> impl Fn(State<AppState>, Request) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static
{
    move |State(state): State<AppState>, req: Request| dispatch(state, operation, req).boxed()
}

async fn dispatch(state: AppState, operation: &'static str, req: Request) -> Response {
    let Some(RequestedVersion(index)) = req.extensions().get::<RequestedVersion>().copied() else {
        return AppError::BadRequest(anyhow::anyhow!("Missing version parameter")).into_response();
    };

    let Some(endpoint) = state.registry.resolve(index, operation).cloned() else {
        tracing::error!(operation, version = index, "unable to locate the method");
        return AppError::InternalError(anyhow::anyhow!(
            "unable to locate the method {}",
            operation
        ))
        .into_response();
    };

    endpoint(state, req).await
}
