use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Project id -> (permission id -> permission name).
pub type PermissionMap = HashMap<Uuid, HashMap<Uuid, String>>;

/// At most one grant exists per (user, project); `permission_ids` is replaced
/// wholesale on every grant.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionGrant {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub permission_ids: Vec<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSummary {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDetail {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

/// Set semantics over a list: first occurrence wins, later repeats are dropped.
pub fn dedup_permission_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
