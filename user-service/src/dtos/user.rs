use serde::Deserialize;
use std::borrow::Cow;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::models::{
    query::{DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT},
    ActiveFilter, Pagination, SortField, SortOrder, UserFilter, UserQuery,
};

/// Raw `GET /users` query string; every value is checked in `into_query`.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "mailid", alias = "email")]
    pub email: Option<String>,
    pub organization: Option<String>,
    pub project_id: Option<String>,
    pub is_active: Option<String>,
    pub is_member: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn reject(errors: &mut ValidationErrors, field: &'static str, message: &'static str) {
    let mut error = ValidationError::new("invalid");
    error.message = Some(Cow::Borrowed(message));
    errors.add(field, error);
}

impl ListUsersQuery {
    pub fn into_query(self) -> Result<UserQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let id = match non_empty(self.id) {
            Some(raw) => Uuid::parse_str(&raw)
                .map_err(|_| reject(&mut errors, "id", "id must be a UUID"))
                .ok(),
            None => None,
        };
        let project_id = match non_empty(self.project_id) {
            Some(raw) => Uuid::parse_str(&raw)
                .map_err(|_| reject(&mut errors, "project_id", "project_id must be a UUID"))
                .ok(),
            None => None,
        };
        let is_active = match non_empty(self.is_active) {
            Some(raw) => ActiveFilter::parse(&raw).unwrap_or_else(|| {
                reject(&mut errors, "is_active", "is_active must be true, false or all");
                ActiveFilter::default()
            }),
            None => ActiveFilter::default(),
        };
        let is_member = match non_empty(self.is_member).map(|v| v.to_lowercase()) {
            Some(raw) if raw == "true" => true,
            Some(raw) if raw == "false" => false,
            Some(_) => {
                reject(&mut errors, "is_member", "is_member must be true or false");
                true
            }
            None => true,
        };

        let page = match non_empty(self.page) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(page) if page >= 1 => page,
                _ => {
                    reject(&mut errors, "page", "page must be a positive integer");
                    DEFAULT_PAGE
                }
            },
            None => DEFAULT_PAGE,
        };
        let limit = match non_empty(self.limit) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
                _ => {
                    reject(&mut errors, "limit", "limit must be between 1 and 50");
                    DEFAULT_LIMIT
                }
            },
            None => DEFAULT_LIMIT,
        };
        let sort = match non_empty(self.sort) {
            Some(raw) => SortField::parse(&raw).unwrap_or_else(|| {
                reject(
                    &mut errors,
                    "sort",
                    "sort must be one of id, name, organization, created_on",
                );
                SortField::default()
            }),
            None => SortField::default(),
        };
        let order = match non_empty(self.order) {
            Some(raw) => SortOrder::parse(&raw).unwrap_or_else(|| {
                reject(&mut errors, "order", "order must be asc or desc");
                SortOrder::default()
            }),
            None => SortOrder::default(),
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(UserQuery {
            filter: UserFilter {
                id,
                name: non_empty(self.name),
                email: non_empty(self.email),
                organization: non_empty(self.organization),
                project_id,
                is_member,
                is_active,
            },
            pagination: Pagination {
                page,
                limit,
                sort,
                order,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let query = ListUsersQuery::default().into_query().unwrap();
        assert_eq!(query.pagination, Pagination::default());
        assert_eq!(query.filter.is_active, ActiveFilter::Active);
        assert!(query.filter.is_member);
    }

    #[test]
    fn invalid_values_are_collected() {
        let raw = ListUsersQuery {
            project_id: Some("nope".to_string()),
            limit: Some("51".to_string()),
            sort: Some("password".to_string()),
            ..ListUsersQuery::default()
        };
        let errors = raw.into_query().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("project_id"));
        assert!(fields.contains_key("limit"));
        assert!(fields.contains_key("sort"));
    }

    #[test]
    fn parses_filters() {
        let project = Uuid::new_v4();
        let raw = ListUsersQuery {
            name: Some(" ada ".to_string()),
            project_id: Some(project.to_string()),
            is_member: Some("false".to_string()),
            is_active: Some("all".to_string()),
            page: Some("2".to_string()),
            order: Some("desc".to_string()),
            ..ListUsersQuery::default()
        };
        let query = raw.into_query().unwrap();
        assert_eq!(query.filter.name.as_deref(), Some("ada"));
        assert_eq!(query.filter.project_id, Some(project));
        assert!(!query.filter.is_member);
        assert_eq!(query.filter.is_active, ActiveFilter::All);
        assert_eq!(query.pagination.page, 2);
        assert_eq!(query.pagination.order, SortOrder::Desc);
    }
}
