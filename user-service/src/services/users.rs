use std::sync::Arc;

use crate::{
    models::{PageMeta, UserQuery, UserResponse},
    services::{error::ServiceError, store::UserStore},
};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// One page of sanitized users; page metadata only when anything matched.
    pub async fn list_users(
        &self,
        query: &UserQuery,
    ) -> Result<(Vec<UserResponse>, Option<PageMeta>), ServiceError> {
        let (users, total) = self.store.list_users(query).await?;
        tracing::debug!(total, returned = users.len(), "Listed users");

        let users = users.iter().map(UserResponse::from).collect();
        Ok((users, PageMeta::new(total, &query.pagination)))
    }
}
