use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{InvitationRedemption, StoreError, UserStore};
use crate::models::{
    PermissionDetail, PermissionGrant, PermissionMap, PermissionSummary, SortField, SortOrder,
    TokenRecord, User, UserQuery,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    tokens: HashMap<Uuid, TokenRecord>,
    grants: HashMap<(Uuid, Uuid), PermissionGrant>,
    catalog: HashMap<Uuid, PermissionDetail>,
}

impl MemoryState {
    fn upsert_grant(&mut self, user_id: Uuid, project_id: Uuid, permission_ids: &[Uuid]) {
        self.grants.insert(
            (user_id, project_id),
            PermissionGrant {
                user_id,
                project_id,
                permission_ids: permission_ids.to_vec(),
                is_active: true,
            },
        );
    }

    fn revoke_unused(&mut self, token_id: Uuid) -> Result<(), StoreError> {
        match self.tokens.get_mut(&token_id) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(())
            }
            _ => Err(StoreError::AlreadyConsumed),
        }
    }
}

/// In-process store with the same transactional guarantees as the SQL store:
/// every call runs under one lock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Backend(format!("Memory store mutex poisoned: {}", e)))
    }

    /// Add a permission to the catalog.
    pub fn seed_permission(&self, id: Uuid, name: &str, description: &str) -> Result<(), StoreError> {
        self.lock()?.catalog.insert(
            id,
            PermissionDetail {
                id,
                name: name.to_string(),
                description: description.to_string(),
            },
        );
        Ok(())
    }

    pub fn grant(&self, user_id: Uuid, project_id: Uuid) -> Result<Option<PermissionGrant>, StoreError> {
        Ok(self.lock()?.grants.get(&(user_id, project_id)).cloned())
    }

    pub fn tokens_for(&self, user_id: Uuid) -> Result<Vec<TokenRecord>, StoreError> {
        Ok(self
            .lock()?
            .tokens
            .values()
            .filter(|t| t.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    pub fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<(), StoreError> {
        if let Some(user) = self.lock()?.users.get_mut(&user_id) {
            user.is_active = active;
        }
        Ok(())
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| !u.is_deleted() && u.email == email)
            .cloned())
    }

    async fn create_user(
        &self,
        user: &User,
        redemption: Option<&InvitationRedemption>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;

        if state
            .users
            .values()
            .any(|u| !u.is_deleted() && u.same_email(&user.email))
            || state.users.contains_key(&user.id)
        {
            return Err(StoreError::Duplicate);
        }

        if let Some(redemption) = redemption {
            state.revoke_unused(redemption.token_id)?;
            state.upsert_grant(user.id, redemption.project_id, &redemption.permission_ids);
        }

        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_tokens(&self, tokens: &[TokenRecord]) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if tokens.iter().any(|t| state.tokens.contains_key(&t.id)) {
            return Err(StoreError::Duplicate);
        }
        for token in tokens {
            state.tokens.insert(token.id, token.clone());
        }
        Ok(())
    }

    async fn lookup_token(&self, token_id: Uuid) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.lock()?.tokens.get(&token_id).cloned())
    }

    async fn revoke_token(&self, token_id: Uuid) -> Result<(), StoreError> {
        if let Some(token) = self.lock()?.tokens.get_mut(&token_id) {
            token.revoked = true;
        }
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        user_id: Uuid,
        password_hash: &str,
        token_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.revoke_unused(token_id)?;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn upsert_permission_grant(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        self.lock()?.upsert_grant(user_id, project_id, permission_ids);
        Ok(())
    }

    async fn fetch_permission_grant(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<PermissionMap, StoreError> {
        let state = self.lock()?;
        let mut permissions = PermissionMap::new();

        let grants = state.grants.values().filter(|g| {
            g.user_id == user_id && g.is_active && project_id.map_or(true, |p| p == g.project_id)
        });
        for grant in grants {
            for id in &grant.permission_ids {
                if let Some(detail) = state.catalog.get(id) {
                    permissions
                        .entry(grant.project_id)
                        .or_default()
                        .insert(*id, detail.name.clone());
                }
            }
        }
        Ok(permissions)
    }

    async fn fetch_permission_catalog(
        &self,
    ) -> Result<HashMap<Uuid, PermissionSummary>, StoreError> {
        Ok(self
            .lock()?
            .catalog
            .values()
            .map(|p| {
                (
                    p.id,
                    PermissionSummary {
                        name: p.name.clone(),
                        description: p.description.clone(),
                    },
                )
            })
            .collect())
    }

    async fn list_user_permissions(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<PermissionDetail>, StoreError> {
        let state = self.lock()?;
        let Some(grant) = state
            .grants
            .get(&(user_id, project_id))
            .filter(|g| g.is_active)
        else {
            return Ok(Vec::new());
        };

        let mut details: Vec<PermissionDetail> = grant
            .permission_ids
            .iter()
            .filter_map(|id| state.catalog.get(id).cloned())
            .collect();
        details.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(details)
    }

    async fn list_users(&self, query: &UserQuery) -> Result<(Vec<User>, i64), StoreError> {
        let state = self.lock()?;
        let filter = &query.filter;

        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| !u.is_deleted())
            .filter(|u| filter.is_active.as_flag().map_or(true, |a| u.is_active == a))
            .filter(|u| filter.id.map_or(true, |id| u.id == id))
            .filter(|u| filter.name.as_deref().map_or(true, |n| contains_ci(&u.name, n)))
            .filter(|u| filter.email.as_deref().map_or(true, |e| contains_ci(&u.email, e)))
            .filter(|u| {
                filter
                    .organization
                    .as_deref()
                    .map_or(true, |o| contains_ci(&u.organization, o))
            })
            .filter(|u| {
                filter.project_id.map_or(true, |p| {
                    state
                        .grants
                        .get(&(u.id, p))
                        .is_some_and(|g| g.is_active == filter.is_member)
                })
            })
            .cloned()
            .collect();

        let page = &query.pagination;
        users.sort_by(|a, b| {
            let ordering = match page.sort {
                SortField::Id => a.id.cmp(&b.id),
                SortField::Name => a.name.cmp(&b.name),
                SortField::Organization => a.organization.cmp(&b.organization),
                SortField::CreatedOn => a.created_at.cmp(&b.created_at),
            };
            match page.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = users.len() as i64;
        let users = users
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok((users, total))
    }
}
