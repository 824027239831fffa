use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{ApiResponse, ForgotPasswordRequest, ResetPasswordRequest, TokenQuery},
    utils::{ApiQuery, ValidatedJson},
    AppState,
};

pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let link = state.auth.forgot_password(&req.email).await?;
    let body = ApiResponse::success("successfully send reset password link to the provided mail")
        .with("reset_link", &link)?;
    Ok((StatusCode::OK, Json(body)))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TokenQuery>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.reset_password(query.token, req).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("password reset successfully")),
    ))
}
