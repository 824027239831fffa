use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        ApiResponse, RefreshRequest, SignInRequest, SignUpRequest, TokenQuery, ValidateTokenQuery,
    },
    middleware::AuthUser,
    utils::{ApiQuery, ValidatedJson},
    AppState,
};

pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        AppError::DatabaseError(e.into())
    })?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("The server is up and running smoothly.")),
    ))
}

pub async fn signin(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignInRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.signin(req).await?;
    let body = ApiResponse::success("Signin Successful")
        .with("user", &res.user)?
        .with("token", &res.token)?;
    Ok((StatusCode::OK, Json(body)))
}

/// `?token=` carries an invitation when present.
pub async fn signup(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TokenQuery>,
    ValidatedJson(req): ValidatedJson<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.signup(req, query.token).await?;
    let mut body = ApiResponse::success("User signup successfully").with("user", &res.user)?;
    if let Some(token) = &res.token {
        body = body.with("token", token)?;
    }
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn validate_token(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiQuery(query): ApiQuery<ValidateTokenQuery>,
) -> Result<impl IntoResponse, AppError> {
    let project_id = query.project_id()?;
    let res = state
        .auth
        .validate_token(&ctx.token, query.permission, project_id)
        .await?;

    let body = if query.permission {
        ApiResponse::success("Validation successful, permissions retrieved successfully")
            .with("permissions", &res)?
    } else {
        ApiResponse::success("Token validation successful").with("user_id", &res.user_id)?
    };
    Ok((StatusCode::OK, Json(body)))
}

pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.auth.refresh(&req.refresh_token).await?;
    let body = ApiResponse::success("Token refresh successful").with("token", &token)?;
    Ok((StatusCode::OK, Json(body)))
}
