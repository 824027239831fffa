//! Persistence boundary for users, issued tokens and permission grants.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    PermissionDetail, PermissionMap, PermissionSummary, TokenRecord, User, UserQuery,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint violation (Postgres 23505).
    #[error("Duplicate record")]
    Duplicate,

    /// A conditional revoke found the token already revoked or missing.
    #[error("Token already consumed")]
    AlreadyConsumed,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Grant applied in the same transaction that creates an invited user.
#[derive(Debug, Clone, PartialEq)]
pub struct InvitationRedemption {
    pub token_id: Uuid,
    pub project_id: Uuid,
    pub permission_ids: Vec<Uuid>,
}

/// Every call is a single round of work against the store; multi-row
/// mutations are committed atomically.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Exact match on the stored email; tombstoned users are invisible.
    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user. With a redemption, the invitation token is revoked and
    /// the grant upserted in the same transaction; a token that was already
    /// revoked aborts everything with `AlreadyConsumed`.
    async fn create_user(
        &self,
        user: &User,
        redemption: Option<&InvitationRedemption>,
    ) -> Result<(), StoreError>;

    async fn insert_tokens(&self, tokens: &[TokenRecord]) -> Result<(), StoreError>;

    async fn lookup_token(&self, token_id: Uuid) -> Result<Option<TokenRecord>, StoreError>;

    async fn revoke_token(&self, token_id: Uuid) -> Result<(), StoreError>;

    /// Store the new hash and revoke the reset token atomically. Fails with
    /// `AlreadyConsumed` when the token was revoked concurrently.
    async fn complete_password_reset(
        &self,
        user_id: Uuid,
        password_hash: &str,
        token_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Atomic insert-or-replace of the grant for (user, project).
    async fn upsert_permission_grant(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), StoreError>;

    /// Active grants of a user, optionally restricted to one project.
    async fn fetch_permission_grant(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<PermissionMap, StoreError>;

    async fn fetch_permission_catalog(
        &self,
    ) -> Result<HashMap<Uuid, PermissionSummary>, StoreError>;

    async fn list_user_permissions(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<PermissionDetail>, StoreError>;

    /// One page of users plus the total number of matches.
    async fn list_users(&self, query: &UserQuery) -> Result<(Vec<User>, i64), StoreError>;
}
