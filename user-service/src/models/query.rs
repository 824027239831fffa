use serde::Serialize;
use uuid::Uuid;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Id,
    Name,
    Organization,
    #[default]
    CreatedOn,
}

impl SortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(SortField::Id),
            "name" => Some(SortField::Name),
            "organization" => Some(SortField::Organization),
            "created_on" => Some(SortField::CreatedOn),
            _ => None,
        }
    }

    /// Whitelisted column name, safe to splice into SQL.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Name => "name",
            SortField::Organization => "organization",
            SortField::CreatedOn => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveFilter {
    #[default]
    Active,
    Inactive,
    All,
}

impl ActiveFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "true" => Some(ActiveFilter::Active),
            "false" => Some(ActiveFilter::Inactive),
            "all" => Some(ActiveFilter::All),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ActiveFilter::Active => Some(true),
            ActiveFilter::Inactive => Some(false),
            ActiveFilter::All => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub organization: Option<String>,
    pub project_id: Option<Uuid>,
    /// Only consulted together with `project_id`.
    pub is_member: bool,
    pub is_active: ActiveFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub sort: SortField,
    pub order: SortOrder,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort: SortField::default(),
            order: SortOrder::default(),
        }
    }
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub filter: UserFilter,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub per_page: u32,
    pub current_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<u32>,
}

impl PageMeta {
    /// No metadata is reported for an empty result.
    pub fn new(total: i64, pagination: &Pagination) -> Option<Self> {
        if total <= 0 {
            return None;
        }
        let per_page = i64::from(pagination.limit.max(1));
        let last_page = (total + per_page - 1) / per_page;
        let current = i64::from(pagination.page);

        Some(Self {
            total,
            per_page: pagination.limit,
            current_page: pagination.page,
            next: (current < last_page).then(|| pagination.page + 1),
            prev: (current > 1).then(|| pagination.page - 1),
        })
    }
}
