use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::LinkConfig,
    dtos::auth::{
        ResetPasswordRequest, SignInRequest, SignInResponse, SignUpRequest, SignUpResponse,
        TokenPair, TokenValidation,
    },
    models::{dedup_permission_ids, Purpose, TokenKind, TokenRecord, User},
    services::{
        email::{self, MailMessage, Mailer},
        error::ServiceError,
        store::{InvitationRedemption, StoreError, UserStore},
        token_codec::{IssuedToken, TokenClaims, TokenCodec, TokenLifetimes},
    },
    utils::{
        hash_password_blocking, token_link, verify_password_blocking, Password,
        PasswordHashString,
    },
};

/// Token lifecycle: sign-in, validation, refresh and password reset.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    codec: TokenCodec,
    lifetimes: TokenLifetimes,
    links: LinkConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        codec: TokenCodec,
        lifetimes: TokenLifetimes,
        links: LinkConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            codec,
            lifetimes,
            links,
        }
    }

    pub async fn signin(&self, req: SignInRequest) -> Result<SignInResponse, ServiceError> {
        req.validate()?;

        let user = self
            .store
            .fetch_user_by_email(&req.email)
            .await?
            .ok_or_else(|| {
                tracing::info!(email = %req.email, "Signin attempted for unknown email");
                ServiceError::InvalidCredentials
            })?;

        let matches = verify_password_blocking(
            Password::new(req.password),
            PasswordHashString::new(user.password_hash.clone()),
        )
        .await?;
        if !matches {
            tracing::warn!(user_id = %user.id, "Signin password mismatch");
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self.issue_session(&user).await?;
        tracing::info!(user_id = %user.id, "User signed in");

        Ok(SignInResponse {
            token,
            user: user.sanitized(),
        })
    }

    /// Create an account. With an invitation token the pending grant is
    /// applied and the invitation consumed together with the insert, and
    /// the new user is signed in.
    pub async fn signup(
        &self,
        req: SignUpRequest,
        invitation_token: Option<String>,
    ) -> Result<SignUpResponse, ServiceError> {
        req.validate()?;
        let purpose: Purpose = req.purpose.parse().map_err(|e: String| {
            ServiceError::invalid_field("purpose", "purpose", &e)
        })?;

        let redemption = match invitation_token.filter(|t| !t.is_empty()) {
            Some(token) => Some(self.resolve_invitation(&token, &req.email).await?),
            None => None,
        };

        let password_hash = hash_password_blocking(Password::new(req.password)).await?;
        let user = User::new(
            req.name,
            req.email,
            password_hash.into_string(),
            req.organization,
            purpose,
        );

        match self.store.create_user(&user, redemption.as_ref()).await {
            Ok(()) => {}
            Err(StoreError::Duplicate) => {
                tracing::info!(email = %user.email, "Signup for an existing email");
                return Err(ServiceError::DuplicateRecord("User"));
            }
            Err(StoreError::AlreadyConsumed) => {
                return Err(ServiceError::Unauthorized("Invitation has already been used"));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user.id, invited = redemption.is_some(), "User signed up");
        self.send_welcome(&user).await;

        let token = match redemption {
            Some(redemption) => {
                tracing::info!(
                    user_id = %user.id,
                    project_id = %redemption.project_id,
                    "Invitation redeemed"
                );
                Some(self.issue_session(&user).await?)
            }
            None => None,
        };

        Ok(SignUpResponse {
            user: user.sanitized(),
            token,
        })
    }

    pub async fn validate_token(
        &self,
        token: &str,
        want_permissions: bool,
        project_id: Option<Uuid>,
    ) -> Result<TokenValidation, ServiceError> {
        self.validate_token_at(token, want_permissions, project_id, Utc::now())
            .await
    }

    /// `validate_token` against an explicit clock.
    pub async fn validate_token_at(
        &self,
        token: &str,
        want_permissions: bool,
        project_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<TokenValidation, ServiceError> {
        let (claims, record) = self.resolve(token, TokenKind::Access).await?;
        if record.revoked {
            return Err(ServiceError::Unauthorized("Token has been revoked"));
        }
        if record.is_expired_at(now) {
            tracing::debug!(token_id = %record.id, expires_at = %record.expires_at, "Access token expired");
            return Err(ServiceError::TokenExpired);
        }

        let user_id = subject(&claims, &record)?;
        let permissions = if want_permissions {
            Some(self.store.fetch_permission_grant(user_id, project_id).await?)
        } else {
            None
        };

        Ok(TokenValidation {
            user_id,
            permissions,
        })
    }

    /// Issue a new access token. The presented refresh token stays valid
    /// until its own expiry.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        self.refresh_at(refresh_token, Utc::now()).await
    }

    /// `refresh` against an explicit clock.
    pub async fn refresh_at(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, ServiceError> {
        let (claims, record) = self.resolve(refresh_token, TokenKind::Refresh).await?;
        if record.revoked {
            return Err(ServiceError::Unauthorized("Token has been revoked"));
        }
        if record.is_expired_at(now) {
            return Err(ServiceError::TokenExpired);
        }

        let user_id = subject(&claims, &record)?;
        let (access, access_record) =
            self.issue(TokenKind::Access, user_id, &claims.email, now)?;
        let access_token_expiry = access_record.expires_at;
        self.store.insert_tokens(&[access_record]).await?;

        tracing::info!(user_id = %user_id, "Access token refreshed");

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh_token.to_string(),
            access_token_expiry,
            refresh_token_expiry: record.expires_at,
        })
    }

    /// Mail a password reset link and return it.
    pub async fn forgot_password(&self, email: &str) -> Result<String, ServiceError> {
        let user = self
            .store
            .fetch_user_by_email(email)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let (issued, record) =
            self.issue(TokenKind::PasswordReset, user.id, &user.email, Utc::now())?;
        self.store.insert_tokens(&[record]).await?;

        let link = token_link(&self.links.reset_password_url, &issued.token);
        self.mailer
            .send(MailMessage::new(
                &user.email,
                email::RESET_PASSWORD_SUBJECT,
                email::reset_password_body(&link),
            ))
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to send reset mail: {}", e)))?;

        tracing::info!(user_id = %user.id, "Password reset link sent");
        Ok(link)
    }

    /// Set a new password. A reset token works exactly once.
    pub async fn reset_password(
        &self,
        reset_token: Option<String>,
        req: ResetPasswordRequest,
    ) -> Result<(), ServiceError> {
        req.validate()?;
        let token = reset_token
            .filter(|t| !t.is_empty())
            .ok_or(ServiceError::Unauthorized("Missing reset token"))?;

        let (claims, record) = self.resolve(&token, TokenKind::PasswordReset).await?;
        if record.revoked || record.is_expired_at(Utc::now()) {
            return Err(ServiceError::TokenExpired);
        }

        let user = self
            .store
            .fetch_user_by_email(&claims.email)
            .await?
            .ok_or(ServiceError::Unauthorized("Unknown user"))?;

        let password_hash = hash_password_blocking(Password::new(req.password)).await?;
        match self
            .store
            .complete_password_reset(user.id, password_hash.as_str(), record.id)
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "Password reset");
                Ok(())
            }
            Err(StoreError::AlreadyConsumed) => Err(ServiceError::TokenExpired),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify `token`, check its kind and load its stored record.
    async fn resolve(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<(TokenClaims, TokenRecord), ServiceError> {
        let claims: TokenClaims = self.codec.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            ServiceError::Unauthorized("Invalid token")
        })?;
        if claims.kind != kind {
            return Err(ServiceError::Unauthorized("Unexpected token kind"));
        }

        let record = self
            .store
            .lookup_token(claims.jti)
            .await?
            .ok_or(ServiceError::Unauthorized("Unknown token"))?;
        if record.kind != kind || !record.matches(token) {
            return Err(ServiceError::Unauthorized("Token does not match its record"));
        }

        Ok((claims, record))
    }

    async fn resolve_invitation(
        &self,
        token: &str,
        email: &str,
    ) -> Result<InvitationRedemption, ServiceError> {
        let (claims, record) = self.resolve(token, TokenKind::Invitation).await?;
        let invitation = claims
            .invitation
            .ok_or(ServiceError::Unauthorized("Invitation payload missing"))?;

        if invitation.email != email {
            tracing::info!(
                invited = %invitation.email,
                requested = %email,
                "Invitation email does not match signup email"
            );
            return Err(ServiceError::Unauthorized("Invitation was issued to another email"));
        }
        if record.revoked {
            return Err(ServiceError::Unauthorized("Invitation has already been used"));
        }
        if record.is_expired_at(Utc::now()) {
            return Err(ServiceError::TokenExpired);
        }

        Ok(InvitationRedemption {
            token_id: record.id,
            project_id: invitation.project_id,
            permission_ids: dedup_permission_ids(&invitation.permission_ids),
        })
    }

    fn issue(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(IssuedToken, TokenRecord), ServiceError> {
        let expires_at = now + self.lifetimes.for_kind(kind);
        let issued = self
            .codec
            .issue(kind, Some(user_id), email, expires_at, None)?;
        let record = TokenRecord::new(
            issued.claims.jti,
            Some(user_id),
            &issued.token,
            kind,
            now,
            expires_at,
        );
        Ok((issued, record))
    }

    async fn issue_session(&self, user: &User) -> Result<TokenPair, ServiceError> {
        let now = Utc::now();
        let (access, access_record) = self.issue(TokenKind::Access, user.id, &user.email, now)?;
        let (refresh, refresh_record) =
            self.issue(TokenKind::Refresh, user.id, &user.email, now)?;

        let pair = TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_token_expiry: access_record.expires_at,
            refresh_token_expiry: refresh_record.expires_at,
        };
        self.store
            .insert_tokens(&[access_record, refresh_record])
            .await?;

        Ok(pair)
    }

    async fn send_welcome(&self, user: &User) {
        let message = MailMessage::new(
            &user.email,
            email::WELCOME_SUBJECT,
            email::welcome_body(&user.name),
        );
        if let Err(e) = self.mailer.send(message).await {
            tracing::warn!(user_id = %user.id, error = %e, "Welcome mail not sent");
        }
    }
}

fn subject(claims: &TokenClaims, record: &TokenRecord) -> Result<Uuid, ServiceError> {
    record
        .user_id
        .or(claims.sub)
        .ok_or(ServiceError::Unauthorized("Token has no subject"))
}
