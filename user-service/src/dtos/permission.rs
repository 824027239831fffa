use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct GrantPermissionRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub project_id: Uuid,

    #[validate(length(min = 1, message = "At least one permission is required"))]
    pub permission_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UserProjectPath {
    pub project_id: Uuid,
    pub user_id: Uuid,
}

/// Result of a grant: applied immediately, or deferred behind an invitation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GrantOutcome {
    Granted { user_id: Uuid },
    Invited { invitation_link: String },
}
