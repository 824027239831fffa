use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use uuid::Uuid;

use super::{InvitationRedemption, StoreError, UserStore};
use crate::models::{
    PermissionDetail, PermissionMap, PermissionSummary, TokenKind, TokenRecord, User, UserFilter,
    UserQuery,
};

const USER_COLUMNS: &str = "u.id, u.name, u.email, u.password_hash, u.organization, u.purpose, \
                            u.is_active, u.created_at, u.updated_at, u.deleted_at";

const UPSERT_GRANT: &str = r#"
    INSERT INTO user_permissions (user_id, project_id, permission_ids, is_active)
    VALUES ($1, $2, $3, TRUE)
    ON CONFLICT (user_id, project_id)
    DO UPDATE SET permission_ids = EXCLUDED.permission_ids,
                  is_active = TRUE,
                  updated_at = NOW()
"#;

const REVOKE_UNUSED: &str = "UPDATE tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Duplicate,
        _ => StoreError::Database(err),
    }
}

fn decode_error(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let purpose: String = row.try_get("purpose")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        organization: row.try_get("organization")?,
        purpose: purpose.parse().map_err(decode_error)?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<TokenRecord, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    Ok(TokenRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token_hash: row.try_get("token_hash")?,
        kind: kind.parse::<TokenKind>().map_err(decode_error)?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        revoked: row.try_get("revoked")?,
    })
}

/// Escape LIKE metacharacters so user input only ever matches literally.
fn contains_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_user_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE u.deleted_at IS NULL");

    if let Some(active) = filter.is_active.as_flag() {
        builder.push(" AND u.is_active = ").push_bind(active);
    }
    if let Some(id) = filter.id {
        builder.push(" AND u.id = ").push_bind(id);
    }
    if let Some(name) = &filter.name {
        builder
            .push(" AND u.name ILIKE ")
            .push_bind(contains_pattern(name));
    }
    if let Some(email) = &filter.email {
        builder
            .push(" AND u.email ILIKE ")
            .push_bind(contains_pattern(email));
    }
    if let Some(organization) = &filter.organization {
        builder
            .push(" AND u.organization ILIKE ")
            .push_bind(contains_pattern(organization));
    }
    if let Some(project_id) = filter.project_id {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM user_permissions up \
                 WHERE up.user_id = u.id AND up.project_id = ",
            )
            .push_bind(project_id)
            .push(" AND up.is_active = ")
            .push_bind(filter.is_member)
            .push(")");
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT {} FROM users u WHERE u.email = $1 AND u.deleted_at IS NULL",
            USER_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn create_user(
        &self,
        user: &User,
        redemption: Option<&InvitationRedemption>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, organization, purpose,
                               is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.organization)
        .bind(user.purpose.as_str())
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        if let Some(redemption) = redemption {
            let revoked = sqlx::query(REVOKE_UNUSED)
                .bind(redemption.token_id)
                .execute(&mut *tx)
                .await?;
            if revoked.rows_affected() == 0 {
                // Dropping the transaction rolls back the user insert.
                return Err(StoreError::AlreadyConsumed);
            }

            sqlx::query(UPSERT_GRANT)
                .bind(user.id)
                .bind(redemption.project_id)
                .bind(redemption.permission_ids.as_slice())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_tokens(&self, tokens: &[TokenRecord]) -> Result<(), StoreError> {
        if tokens.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO tokens (id, user_id, token_hash, kind, created_at, expires_at, revoked) ",
        );
        builder.push_values(tokens, |mut row, token| {
            row.push_bind(token.id)
                .push_bind(token.user_id)
                .push_bind(token.token_hash.clone())
                .push_bind(token.kind.as_str())
                .push_bind(token.created_at)
                .push_bind(token.expires_at)
                .push_bind(token.revoked);
        });

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_insert_error)?;
        Ok(())
    }

    async fn lookup_token(&self, token_id: Uuid) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, token_hash, kind, created_at, expires_at, revoked \
             FROM tokens WHERE id = $1",
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(token_from_row).transpose()?)
    }

    async fn revoke_token(&self, token_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE tokens SET revoked = TRUE WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        user_id: Uuid,
        password_hash: &str,
        token_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query(REVOKE_UNUSED)
            .bind(token_id)
            .execute(&mut *tx)
            .await?;
        if revoked.rows_affected() == 0 {
            return Err(StoreError::AlreadyConsumed);
        }

        sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = NOW() \
             WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_permission_grant(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        sqlx::query(UPSERT_GRANT)
            .bind(user_id)
            .bind(project_id)
            .bind(permission_ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_permission_grant(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<PermissionMap, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT up.project_id, p.id AS permission_id, p.name
            FROM user_permissions up
            JOIN permissions p ON p.id = ANY(up.permission_ids) AND p.is_deleted = FALSE
            WHERE up.user_id = $1
              AND up.is_active = TRUE
              AND ($2::uuid IS NULL OR up.project_id = $2)
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let mut permissions = PermissionMap::new();
        for row in rows {
            let project: Uuid = row.try_get("project_id")?;
            let permission: Uuid = row.try_get("permission_id")?;
            let name: String = row.try_get("name")?;
            permissions
                .entry(project)
                .or_default()
                .insert(permission, name);
        }
        Ok(permissions)
    }

    async fn fetch_permission_catalog(
        &self,
    ) -> Result<HashMap<Uuid, PermissionSummary>, StoreError> {
        let rows = sqlx::query("SELECT id, name, description FROM permissions WHERE is_deleted = FALSE")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(Uuid, PermissionSummary), StoreError> {
                Ok((
                    row.try_get("id")?,
                    PermissionSummary {
                        name: row.try_get("name")?,
                        description: row.try_get("description")?,
                    },
                ))
            })
            .collect()
    }

    async fn list_user_permissions(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<PermissionDetail>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.description
            FROM user_permissions up
            JOIN permissions p ON p.id = ANY(up.permission_ids) AND p.is_deleted = FALSE
            WHERE up.user_id = $1 AND up.project_id = $2 AND up.is_active = TRUE
            ORDER BY p.name
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<PermissionDetail, StoreError> {
                Ok(PermissionDetail {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    async fn list_users(&self, query: &UserQuery) -> Result<(Vec<User>, i64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u");
        push_user_filters(&mut count, &query.filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        if total == 0 {
            return Ok((Vec::new(), 0));
        }

        let page = &query.pagination;
        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users u", USER_COLUMNS));
        push_user_filters(&mut select, &query.filter);
        select
            .push(format!(
                " ORDER BY u.{} {}",
                page.sort.column(),
                page.order.keyword()
            ))
            .push(" LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select.build().fetch_all(&self.pool).await?;
        let users = rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((users, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(contains_pattern("ada"), "%ada%");
        assert_eq!(contains_pattern("100%_done"), "%100\\%\\_done%");
    }

    #[test]
    fn filters_render_in_order() {
        let filter = UserFilter {
            name: Some("ada".to_string()),
            project_id: Some(Uuid::nil()),
            is_member: true,
            ..UserFilter::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u");
        push_user_filters(&mut builder, &filter);
        let sql = builder.sql();

        assert!(sql.contains("u.deleted_at IS NULL"));
        assert!(sql.contains("u.is_active = $1"));
        assert!(sql.contains("u.name ILIKE $2"));
        assert!(sql.contains("up.project_id = $3"));
        assert!(sql.contains("up.is_active = $4"));
    }
}
