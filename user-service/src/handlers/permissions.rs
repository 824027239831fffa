use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{ApiResponse, GrantOutcome, GrantPermissionRequest, UserProjectPath},
    utils::{ApiPath, ValidatedJson},
    AppState,
};

const PERMISSIONS_LISTED: &str = "All permissions retrieved successfully";

pub async fn grant_permissions(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<GrantPermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let body = match state.permissions.grant(req).await? {
        GrantOutcome::Invited { invitation_link } => {
            ApiResponse::success("User invited successfully")
                .with("invitation_link", &invitation_link)?
        }
        GrantOutcome::Granted { .. } => ApiResponse::success("User permissions added successfully"),
    };
    Ok((StatusCode::OK, Json(body)))
}

pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let catalog = state.permissions.list_all().await?;
    let body = ApiResponse::success(PERMISSIONS_LISTED).with("permissions", &catalog)?;
    Ok((StatusCode::OK, Json(body)))
}

pub async fn list_user_permissions(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<UserProjectPath>,
) -> Result<impl IntoResponse, AppError> {
    let details = state
        .permissions
        .list_for_user_project(path.user_id, path.project_id)
        .await?;
    let body = ApiResponse::success(PERMISSIONS_LISTED).with("permissions", &details)?;
    Ok((StatusCode::OK, Json(body)))
}
