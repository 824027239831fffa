use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::LinkConfig,
    dtos::permission::{GrantOutcome, GrantPermissionRequest},
    models::{dedup_permission_ids, PermissionDetail, PermissionSummary, TokenKind, TokenRecord},
    services::{
        email::{self, MailMessage, Mailer},
        error::ServiceError,
        store::UserStore,
        token_codec::{InvitationClaim, TokenCodec, TokenLifetimes},
    },
    utils::token_link,
};

/// Project permission grants, direct or through an invitation.
#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    codec: TokenCodec,
    lifetimes: TokenLifetimes,
    links: LinkConfig,
}

impl PermissionService {
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

    /// Replace the user's permission set on the project, or invite the
    /// email when no account exists yet.
    pub async fn grant(&self, req: GrantPermissionRequest) -> Result<GrantOutcome, ServiceError> {
        req.validate()?;
        let permission_ids = dedup_permission_ids(&req.permission_ids);

        match self.store.fetch_user_by_email(&req.email).await? {
            Some(user) => {
                self.store
                    .upsert_permission_grant(user.id, req.project_id, &permission_ids)
                    .await?;
                tracing::info!(
                    user_id = %user.id,
                    project_id = %req.project_id,
                    permissions = permission_ids.len(),
                    "Permissions granted"
                );
                Ok(GrantOutcome::Granted { user_id: user.id })
            }
            None => {
                let invitation_link = self
                    .invite(req.email, req.project_id, permission_ids)
                    .await?;
                Ok(GrantOutcome::Invited { invitation_link })
            }
        }
    }

    async fn invite(
        &self,
        email: String,
        project_id: Uuid,
        permission_ids: Vec<Uuid>,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let expires_at = now + self.lifetimes.invitation;
        let claim = InvitationClaim {
            email: email.clone(),
            project_id,
            permission_ids,
        };

        let issued = self
            .codec
            .issue(TokenKind::Invitation, None, &email, expires_at, Some(claim))?;
        let record = TokenRecord::new(
            issued.claims.jti,
            None,
            &issued.token,
            TokenKind::Invitation,
            now,
            expires_at,
        );
        self.store.insert_tokens(&[record]).await?;

        let link = token_link(&self.links.signup_url, &issued.token);
        self.mailer
            .send(MailMessage::new(
                &email,
                email::INVITATION_SUBJECT,
                email::invitation_body(&link),
            ))
            .await
            .map_err(|e| {
                ServiceError::Internal(anyhow::anyhow!("Failed to send invitation mail: {}", e))
            })?;

        tracing::info!(project_id = %project_id, email = %email, "Invitation sent");
        Ok(link)
    }

    pub async fn list_all(&self) -> Result<HashMap<Uuid, PermissionSummary>, ServiceError> {
        Ok(self.store.fetch_permission_catalog().await?)
    }

    pub async fn list_for_user_project(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<PermissionDetail>, ServiceError> {
        Ok(self.store.list_user_permissions(user_id, project_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::models::{Purpose, User};
    use crate::services::email::RecordingMailer;
    use crate::services::store::MemoryStore;
    use crate::services::token_codec::TokenClaims;

    struct Fixture {
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        codec: TokenCodec,
        permissions: PermissionService,
    }

    fn fixture_with(mailer: RecordingMailer) -> Fixture {
        let jwt = JwtConfig {
            secret_key: "unit-test-secret-with-at-least-32-bytes".to_string(),
            issuer: "plugmin_user".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_hours: 24,
            reset_token_expiry_minutes: 15,
            invitation_token_expiry_hours: 24,
        };
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(mailer);
        let codec = TokenCodec::new(&jwt);
        let permissions = PermissionService::new(
            store.clone(),
            mailer.clone(),
            codec.clone(),
            TokenLifetimes::from_config(&jwt),
            LinkConfig {
                signup_url: "https://app.example.com/signup".to_string(),
                reset_password_url: "https://app.example.com/reset".to_string(),
            },
        );
        Fixture {
            store,
            mailer,
            codec,
            permissions,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingMailer::new())
    }

    async fn existing_user(store: &MemoryStore, email: &str) -> User {
        let user = User::new(
            "Ada Lovelace".to_string(),
            email.to_string(),
            "hash".to_string(),
            "Acme".to_string(),
            Purpose::Developer,
        );
        store.create_user(&user, None).await.unwrap();
        user
    }

    fn request(email: &str, project_id: Uuid, permission_ids: Vec<Uuid>) -> GrantPermissionRequest {
        GrantPermissionRequest {
            email: email.to_string(),
            project_id,
            permission_ids,
        }
    }

    #[tokio::test]
    async fn second_grant_replaces_the_first() {
        let f = fixture();
        let user = existing_user(&f.store, "ada@example.com").await;
        let project = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        f.permissions
            .grant(request("ada@example.com", project, vec![a, b]))
            .await
            .unwrap();
        let outcome = f
            .permissions
            .grant(request("ada@example.com", project, vec![c]))
            .await
            .unwrap();

        assert_eq!(outcome, GrantOutcome::Granted { user_id: user.id });
        let grant = f.store.grant(user.id, project).unwrap().unwrap();
        assert_eq!(grant.permission_ids, vec![c]);
        assert!(f.mailer.messages().is_empty());
    }

    #[tokio::test]
    async fn duplicate_ids_are_stored_once() {
        let f = fixture();
        let user = existing_user(&f.store, "ada@example.com").await;
        let project = Uuid::new_v4();
        let a = Uuid::new_v4();

        f.permissions
            .grant(request("ada@example.com", project, vec![a, a, a]))
            .await
            .unwrap();
        let grant = f.store.grant(user.id, project).unwrap().unwrap();
        assert_eq!(grant.permission_ids, vec![a]);
    }

    #[tokio::test]
    async fn unknown_email_gets_invitation() {
        let f = fixture();
        let project = Uuid::new_v4();
        let a = Uuid::new_v4();

        let outcome = f
            .permissions
            .grant(request("new@example.com", project, vec![a, a]))
            .await
            .unwrap();
        let GrantOutcome::Invited { invitation_link } = outcome else {
            panic!("expected an invitation");
        };
        assert!(invitation_link.starts_with("https://app.example.com/signup?token="));

        let sent = f.mailer.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, email::INVITATION_SUBJECT);
        assert_eq!(sent[0].to, vec!["new@example.com".to_string()]);

        let token = invitation_link.split("token=").nth(1).unwrap();
        let claims: TokenClaims = f.codec.verify(token).unwrap();
        assert_eq!(claims.kind, TokenKind::Invitation);
        assert_eq!(claims.sub, None);
        let invitation = claims.invitation.unwrap();
        assert_eq!(invitation.project_id, project);
        assert_eq!(invitation.permission_ids, vec![a]);

        let record = f.store.lookup_token(claims.jti).await.unwrap().unwrap();
        assert!(!record.revoked);
        assert!(record.matches(token));
    }

    #[tokio::test]
    async fn invitation_mail_failure_is_an_error() {
        let f = fixture_with(RecordingMailer::failing());
        let result = f
            .permissions
            .grant(request("new@example.com", Uuid::new_v4(), vec![Uuid::new_v4()]))
            .await;
        assert!(matches!(result, Err(ServiceError::Internal(_))));
    }

    #[tokio::test]
    async fn empty_permission_list_is_rejected() {
        let f = fixture();
        let result = f
            .permissions
            .grant(request("ada@example.com", Uuid::new_v4(), vec![]))
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn lists_catalog_and_user_permissions() {
        let f = fixture();
        let user = existing_user(&f.store, "ada@example.com").await;
        let project = Uuid::new_v4();
        let (read, write) = (Uuid::new_v4(), Uuid::new_v4());
        f.store.seed_permission(read, "read", "Read access").unwrap();
        f.store.seed_permission(write, "write", "Write access").unwrap();

        let catalog = f.permissions.list_all().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[&write].description, "Write access");

        f.permissions
            .grant(request("ada@example.com", project, vec![read]))
            .await
            .unwrap();
        let details = f
            .permissions
            .list_for_user_project(user.id, project)
            .await
            .unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].id, read);
        assert_eq!(details[0].name, "read");

        assert!(f
            .permissions
            .list_for_user_project(user.id, Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }
}
