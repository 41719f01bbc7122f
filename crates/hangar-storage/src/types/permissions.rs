//! Global permission registry and group permission attachments.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{GroupId, GroupPermissionId, PermissionCategoryId, PermissionId, TargetType};

/// Grouping of global permissions for display.
#[derive(Clone, Debug, Serialize)]
pub struct PermissionCategory {
    pub id: PermissionCategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Reusable, URN-identified permission definition.
#[derive(Clone, Debug, Serialize)]
pub struct Permission {
    pub id: PermissionId,
    pub urn: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<PermissionCategoryId>,
    pub created_at: DateTime<Utc>,
}

/// What a group permission attachment grants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionGrant {
    /// Reference to a permission in the global registry.
    Global { permission_id: PermissionId },
    /// Permission defined inline for this group only.
    Custom {
        urn: String,
        name: String,
        description: Option<String>,
    },
}

impl PermissionGrant {
    pub fn is_global(&self) -> bool {
        matches!(self, PermissionGrant::Global { .. })
    }
}

/// Group permission attachment record
#[derive(Clone, Debug, Serialize)]
pub struct GroupPermission {
    pub id: GroupPermissionId,
    pub group_id: GroupId,
    pub grant: PermissionGrant,
    pub target_type: TargetType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a permission category
#[derive(Clone, Debug)]
pub struct CreatePermissionCategoryParams {
    pub name: String,
    pub description: Option<String>,
}

/// Parameters for creating a global permission
#[derive(Clone, Debug)]
pub struct CreatePermissionParams {
    pub urn: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<PermissionCategoryId>,
}

/// Parameters for attaching a permission to a group
#[derive(Clone, Debug)]
pub struct CreateGroupPermissionParams {
    pub group_id: GroupId,
    pub grant: PermissionGrant,
    pub target_type: TargetType,
}

/// Replacement values for an existing attachment.
#[derive(Clone, Debug)]
pub struct UpdateGroupPermissionParams {
    pub grant: PermissionGrant,
    pub target_type: TargetType,
}
