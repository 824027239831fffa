use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Purpose tag carried by every issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    Invitation,
    PasswordReset,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Invitation => "invitation",
            TokenKind::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            "invitation" => Ok(TokenKind::Invitation),
            "password_reset" => Ok(TokenKind::PasswordReset),
            _ => Err(format!("Invalid token kind: {}", s)),
        }
    }
}

/// Persisted record of an issued token. Only `revoked` ever changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    /// Matches the `jti` claim.
    pub id: Uuid,
    /// Absent for invitations, whose subject has no account yet.
    pub user_id: Option<Uuid>,
    /// SHA-256 of the signed token string.
    pub token_hash: String,
    pub kind: TokenKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl TokenRecord {
    pub fn new(
        id: Uuid,
        user_id: Option<Uuid>,
        token: &str,
        kind: TokenKind,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            token_hash: Self::hash_token(token),
            kind,
            created_at,
            expires_at,
            revoked: false,
        }
    }

    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn matches(&self, token: &str) -> bool {
        self.token_hash == Self::hash_token(token)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.expires_at, now)
    }
}

/// A token is expired from the instant `now` reaches `expires_at`.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at
}
