mod auth;
mod version;

pub use auth::{authorize, bearer_token, AuthContext, AuthUser, BearerToken, EXEMPT_PATHS};
pub use version::{version_guard, RequestedVersion};
