use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{ApiResponse, ListUsersQuery},
    utils::ApiQuery,
    AppState,
};

pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(raw): ApiQuery<ListUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let query = raw.into_query()?;
    let (users, meta) = state.users.list_users(&query).await?;

    let mut body = ApiResponse::success("Users retrieved successfully").with("user", &users)?;
    if let Some(meta) = meta {
        body = body.with("meta_data", &meta)?;
    }
    Ok((StatusCode::OK, Json(body)))
}
