use axum::{
    extract::{RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::AppState;

/// Index of the caller's API version in the accepted-version list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedVersion(pub usize);

/// Reject requests whose `:version` segment is missing or not accepted.
pub async fn version_guard(
    State(state): State<AppState>,
    params: RawPathParams,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let requested = params
        .iter()
        .find(|(key, _)| *key == "version")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing version parameter")))?;

    let index = state.registry.versions().resolve(&requested).ok_or_else(|| {
        tracing::debug!(version = %requested, "Unsupported API version requested");
        AppError::BadRequest(anyhow::anyhow!(
            "Given version is not supported by the system"
        ))
    })?;

    req.extensions_mut().insert(RequestedVersion(index));
    Ok(next.run(req).await)
}
