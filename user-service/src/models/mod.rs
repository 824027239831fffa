pub mod permission;
pub mod query;
pub mod token;
pub mod user;

pub use permission::{
    dedup_permission_ids, PermissionDetail, PermissionGrant, PermissionMap, PermissionSummary,
};
pub use query::{ActiveFilter, PageMeta, Pagination, SortField, SortOrder, UserFilter, UserQuery};
pub use token::{is_expired, TokenKind, TokenRecord};
pub use user::{Purpose, User, UserResponse};
