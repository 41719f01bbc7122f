//! Permission resolution from a role and a group's attachments.

use std::collections::HashMap;

use hangar_storage::{Group, GroupPermission, GroupRole, Permission, PermissionGrant, PermissionId};

use crate::views::{PermissionSource, ResolvedPermission};

/// Expand an attachment into its URN, name and description.
///
/// Global grants whose registry entry is missing from `registry` resolve to `None`.
pub fn resolve_attachment(
    group: &Group,
    attachment: &GroupPermission,
    registry: &HashMap<PermissionId, Permission>,
) -> Option<ResolvedPermission> {
    let (urn, name, description, source) = match &attachment.grant {
        PermissionGrant::Global { permission_id } => {
            let permission = registry.get(permission_id)?;
            (
                permission.urn.clone(),
                permission.name.clone(),
                permission.description.clone(),
                PermissionSource::Global,
            )
        }
        PermissionGrant::Custom {
            urn,
            name,
            description,
        } => (
            urn.clone(),
            name.clone(),
            description.clone(),
            PermissionSource::GroupScoped,
        ),
    };

    Some(ResolvedPermission {
        urn,
        name,
        description,
        group_id: group.id.clone(),
        group_name: group.name.clone(),
        source,
        target_type: attachment.target_type,
        group_permission_id: attachment.id.clone(),
    })
}

/// Attachments of `group` whose target audience includes `role`.
pub fn permissions_for_role(
    group: &Group,
    role: GroupRole,
    attachments: &[GroupPermission],
    registry: &HashMap<PermissionId, Permission>,
) -> Vec<ResolvedPermission> {
    attachments
        .iter()
        .filter(|a| a.target_type.includes(role))
        .filter_map(|a| resolve_attachment(group, a, registry))
        .collect()
}
