pub mod auth;
pub mod permission;
pub mod user;

pub use auth::{
    ForgotPasswordRequest, RefreshRequest, ResetPasswordRequest, SignInRequest,
    SignInResponse, SignUpRequest, SignUpResponse, TokenPair, TokenQuery, TokenValidation,
    ValidateTokenQuery,
};
pub use permission::{GrantOutcome, GrantPermissionRequest, UserProjectPath};
pub use user::ListUsersQuery;

use serde::Serialize;
use serde_json::{Map, Value};
use service_core::error::AppError;

/// `{status, message, data}` envelope wrapped around every success body.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data: Map::new(),
        }
    }

    /// Add `value` under `key` in `data`.
    pub fn with<T: Serialize>(mut self, key: &str, value: &T) -> Result<Self, AppError> {
        let value = serde_json::to_value(value).map_err(|e| AppError::InternalError(e.into()))?;
        self.data.insert(key.to_string(), value);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let body = serde_json::to_value(
            ApiResponse::success("Signin Successful")
                .with("user_id", &"abc")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Signin Successful");
        assert_eq!(body["data"]["user_id"], "abc");
    }

    #[test]
    fn empty_data_is_omitted() {
        let body = serde_json::to_value(ApiResponse::success("done")).unwrap();
        assert!(body.get("data").is_none());
    }
}
