use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::user::{non_empty, reject};
use crate::models::{PermissionMap, UserResponse};
use crate::utils::{validate_name, validate_password_format, validate_purpose};

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[serde(rename = "mail_id", alias = "email")]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(
        length(min = 2, max = 100, message = "Name must be 2-100 characters"),
        custom(function = "validate_name")
    )]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "validate_password_format"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,

    #[validate(custom(function = "validate_purpose"))]
    pub purpose: String,

    #[validate(
        length(min = 2, max = 100, message = "Organization must be 2-100 characters"),
        custom(function = "validate_name")
    )]
    pub organization: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[serde(rename = "mail_id", alias = "email")]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(custom(function = "validate_password_format"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// `?token=` carried by signup and reset-password links.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidateTokenQuery {
    #[serde(default)]
    pub permission: bool,
    /// Blank means every project.
    pub project_id: Option<String>,
}

impl ValidateTokenQuery {
    pub fn project_id(&self) -> Result<Option<Uuid>, ValidationErrors> {
        let Some(raw) = non_empty(self.project_id.clone()) else {
            return Ok(None);
        };
        Uuid::parse_str(&raw).map(Some).map_err(|_| {
            let mut errors = ValidationErrors::new();
            reject(&mut errors, "project_id", "project_id must be a UUID");
            errors
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expiry: DateTime<Utc>,
    pub refresh_token_expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInResponse {
    pub token: TokenPair,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub user: UserResponse,
    /// Present when the signup redeemed an invitation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenPair>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenValidation {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionMap>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignUpRequest {
        SignUpRequest {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "Str0ng!pass".to_string(),
            confirm_password: "Str0ng!pass".to_string(),
            purpose: "developer".to_string(),
            organization: "Analytical Engines".to_string(),
        }
    }

    #[test]
    fn valid_signup_passes() {
        assert!(signup().validate().is_ok());
    }

    #[test]
    fn mismatched_confirmation_fails() {
        let mut req = signup();
        req.confirm_password = "Other!pass1".to_string();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));
    }

    #[test]
    fn every_bad_field_is_reported() {
        let req = SignUpRequest {
            name: "A".to_string(),
            email: "not-an-email".to_string(),
            password: "weak".to_string(),
            confirm_password: "weak".to_string(),
            purpose: "manager".to_string(),
            organization: "Acme".to_string(),
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        for field in ["name", "email", "password", "purpose"] {
            assert!(fields.contains_key(field), "missing {}", field);
        }
    }

    #[test]
    fn blank_project_id_means_every_project() {
        for raw in [None, Some(""), Some("  ")] {
            let query = ValidateTokenQuery {
                permission: true,
                project_id: raw.map(str::to_string),
            };
            assert_eq!(query.project_id().unwrap(), None);
        }

        let project = Uuid::new_v4();
        let query = ValidateTokenQuery {
            permission: true,
            project_id: Some(format!(" {} ", project)),
        };
        assert_eq!(query.project_id().unwrap(), Some(project));
    }

    #[test]
    fn malformed_project_id_is_a_field_error() {
        let query = ValidateTokenQuery {
            permission: true,
            project_id: Some("not-a-uuid".to_string()),
        };
        let errors = query.project_id().unwrap_err();
        assert!(errors.field_errors().contains_key("project_id"));
    }

    #[test]
    fn signin_accepts_mail_id() {
        let req: SignInRequest =
            serde_json::from_str(r#"{"mail_id":"a@example.com","password":"x"}"#).unwrap();
        assert_eq!(req.email, "a@example.com");
    }
}
