use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// JSON body that has passed its `Validate` rules. Malformed JSON is a 400,
/// rule violations a 422 listing each field.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e)))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

fn failure(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// 8-20 characters with at least one upper-case letter, lower-case letter,
/// digit and special character.
pub fn validate_password_format(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    let ok = (8..=20).contains(&len)
        && password.chars().any(char::is_uppercase)
        && password.chars().any(char::is_lowercase)
        && password.chars().any(|c| c.is_ascii_digit())
        && password
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if ok {
        Ok(())
    } else {
        Err(failure(
            "password_format",
            "Password must be 8-20 characters and include upper-case, lower-case, digit and special characters",
        ))
    }
}

/// ASCII letters in words separated by single spaces.
pub fn validate_name(value: &str) -> Result<(), ValidationError> {
    let ok = !value.is_empty()
        && value
            .split(' ')
            .all(|word| !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic()));

    if ok {
        Ok(())
    } else {
        Err(failure(
            "name_format",
            "Only letters separated by single spaces are allowed",
        ))
    }
}

pub fn validate_purpose(value: &str) -> Result<(), ValidationError> {
    match value {
        "student" | "developer" | "other" => Ok(()),
        _ => Err(failure(
            "purpose",
            "Purpose must be one of student, developer, other",
        )),
    }
}
