use axum::{
    async_trait,
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{models::PermissionMap, AppState};

/// Routes reachable without a bearer token.
pub const EXEMPT_PATHS: &[&str] = &[
    "/api/:version/users/health",
    "/api/:version/users/signin",
    "/api/:version/users/signup",
    "/api/:version/users/refresh-token",
    "/api/:version/users/forgot-password",
    "/api/:version/users/reset-password",
];

/// Caller identity attached by `authorize`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    /// Grants across every project.
    pub permissions: PermissionMap,
    pub token: String,
}

#[derive(Debug, PartialEq)]
pub enum BearerToken<'a> {
    Missing,
    Malformed,
    Present(&'a str),
}

/// Read `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> BearerToken<'_> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return BearerToken::Missing;
    };
    let Ok(value) = value.to_str() else {
        return BearerToken::Malformed;
    };
    if value.is_empty() {
        return BearerToken::Missing;
    }

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            BearerToken::Present(token)
        }
        _ => BearerToken::Malformed,
    }
}

fn is_exempt(req: &Request) -> bool {
    req.extensions()
        .get::<MatchedPath>()
        .is_some_and(|path| EXEMPT_PATHS.contains(&path.as_str()))
}

/// Validate any presented token, even on exempt routes; require one
/// everywhere else.
pub async fn authorize(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = match bearer_token(req.headers()) {
        BearerToken::Present(token) => token.to_string(),
        BearerToken::Malformed => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid authorization format"
            )));
        }
        BearerToken::Missing if is_exempt(&req) => return Ok(next.run(req).await),
        BearerToken::Missing => {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Missing Authorization token"
            )));
        }
    };

    let validation = state.auth.validate_token(&token, true, None).await?;

    req.extensions_mut().insert(AuthContext {
        user_id: validation.user_id,
        permissions: validation.permissions.unwrap_or_default(),
        token,
    });

    Ok(next.run(req).await)
}

/// Extractor for handlers behind `authorize`.
pub struct AuthUser(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing Authorization token")))
    }
}
