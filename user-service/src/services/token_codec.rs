use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::TokenKind;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("Invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),

    #[error("Expiry {0} is outside the representable range")]
    InvalidExpiry(i64),
}

/// Deferred grant carried inside an invitation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationClaim {
    pub email: String,
    pub project_id: Uuid,
    pub permission_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token id, the key of the stored token record.
    pub jti: Uuid,
    pub iss: String,
    /// Owning user; absent for invitations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Uuid>,
    pub email: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation: Option<InvitationClaim>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Result<DateTime<Utc>, CodecError> {
        DateTime::from_timestamp(self.exp, 0).ok_or(CodecError::InvalidExpiry(self.exp))
    }

    pub fn issued_at(&self) -> Result<DateTime<Utc>, CodecError> {
        DateTime::from_timestamp(self.iat, 0).ok_or(CodecError::InvalidExpiry(self.iat))
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// How long each kind of token stays valid after issuance.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
    pub password_reset: Duration,
    pub invitation: Duration,
}

impl TokenLifetimes {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            access: Duration::minutes(config.access_token_expiry_minutes),
            refresh: Duration::hours(config.refresh_token_expiry_hours),
            password_reset: Duration::minutes(config.reset_token_expiry_minutes),
            invitation: Duration::hours(config.invitation_token_expiry_hours),
        }
    }

    pub fn for_kind(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access,
            TokenKind::Refresh => self.refresh,
            TokenKind::PasswordReset => self.password_reset,
            TokenKind::Invitation => self.invitation,
        }
    }
}

/// Signs and verifies HS256 claim tokens with the service secret.
///
/// Verification is purely cryptographic: expiry and revocation are checked
/// by the caller against a clock and the token store.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            issuer: config.issuer.clone(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issue(
        &self,
        kind: TokenKind,
        subject: Option<Uuid>,
        email: &str,
        expires_at: DateTime<Utc>,
        invitation: Option<InvitationClaim>,
    ) -> Result<IssuedToken, CodecError> {
        let claims = TokenClaims {
            jti: Uuid::new_v4(),
            iss: self.issuer.clone(),
            sub: subject,
            email: email.to_string(),
            kind,
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
            invitation,
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(CodecError::Signing)?;

        Ok(IssuedToken { token, claims })
    }

    /// Check signature, algorithm, issuer and claim shape.
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, CodecError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<C>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(CodecError::Invalid)
    }
}
