//! Request and response shapes of the service boundary.

use chrono::{DateTime, Utc};
use hangar_storage::{
    CategoryId, Group, GroupId, GroupPermissionId, GroupRole, JoinMode, TargetType, UserId,
    Visibility,
};
use serde::Serialize;

/// Input for `create_group`; the caller becomes the owner.
#[derive(Clone, Debug)]
pub struct NewGroup {
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub join_mode: JoinMode,
}

/// A group-scoped permission defined inline on the group.
#[derive(Clone, Debug)]
pub struct CustomPermission {
    pub urn: String,
    pub name: String,
    pub description: Option<String>,
}

/// Changes to a permission attachment. Name and description only apply to
/// group-scoped grants.
#[derive(Clone, Debug, Default)]
pub struct PermissionChanges {
    pub target_type: Option<TargetType>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GroupDetails {
    pub group: Group,
    pub admin_ids: Vec<UserId>,
    pub member_count: usize,
    pub caller_role: GroupRole,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemberView {
    pub user_id: UserId,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MembershipView {
    pub group: Group,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionSource {
    Global,
    GroupScoped,
}

/// A permission granted through one group attachment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedPermission {
    pub urn: String,
    pub name: String,
    pub description: Option<String>,
    pub group_id: GroupId,
    pub group_name: String,
    pub source: PermissionSource,
    pub target_type: TargetType,
    pub group_permission_id: GroupPermissionId,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemberPermissions {
    pub user_id: UserId,
    pub role: GroupRole,
    pub permissions: Vec<ResolvedPermission>,
}
