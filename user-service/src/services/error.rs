use service_core::error::AppError;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

use super::store::StoreError;
use super::token_codec::CodecError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Token expired")]
    TokenExpired,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    DuplicateRecord(&'static str),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Token codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Single-field validation failure.
    pub fn invalid_field(field: &'static str, code: &'static str, message: &str) -> Self {
        let mut error = ValidationError::new(code);
        error.message = Some(message.to_string().into());
        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        ServiceError::Validation(errors)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => AppError::ValidationError(e),
            ServiceError::InvalidCredentials => AppError::InvalidCredentials,
            ServiceError::Unauthorized(reason) => AppError::Unauthorized(anyhow::anyhow!(reason)),
            ServiceError::TokenExpired => AppError::TokenExpired,
            ServiceError::NotFound(what) => {
                AppError::NotFound(anyhow::anyhow!("{} not found", what))
            }
            ServiceError::DuplicateRecord(what) => {
                AppError::Conflict(anyhow::anyhow!("{} already exists", what))
            }
            ServiceError::Store(e) => {
                tracing::error!(error = %e, "Store call failed");
                AppError::DatabaseError(anyhow::Error::new(e))
            }
            ServiceError::Codec(e) => {
                tracing::error!(error = %e, "Token codec failed");
                AppError::InternalError(anyhow::Error::new(e))
            }
            ServiceError::Internal(e) => {
                tracing::error!(error = %e, "Internal failure");
                AppError::InternalError(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_codes() {
        assert_eq!(AppError::from(ServiceError::InvalidCredentials).code(), "USR4025");
        assert_eq!(AppError::from(ServiceError::TokenExpired).code(), "USR4020");
        assert_eq!(
            AppError::from(ServiceError::DuplicateRecord("User")).code(),
            "USR4011"
        );
        assert_eq!(
            AppError::from(ServiceError::invalid_field("email", "email", "bad")).code(),
            "USR4000"
        );
    }

    #[test]
    fn store_failures_collapse_to_internal() {
        let err = AppError::from(ServiceError::Store(StoreError::Backend("boom".into())));
        assert_eq!(err.code(), "USR500");
    }
}
