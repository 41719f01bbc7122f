//! Permission handlers: registry, group attachments, resolution

use std::collections::{BTreeMap, HashMap, HashSet};

use futures::future::try_join_all;
use hangar_storage::{
    CreateGroupPermissionParams, CreatePermissionCategoryParams, CreatePermissionParams, Group,
    GroupId, GroupPermission, GroupPermissionId, GroupRole, Permission, PermissionCategory,
    PermissionGrant, PermissionId, Store, StoreError, TargetType, UpdateGroupPermissionParams,
    UserId,
};
use tracing::{debug, info};

use super::validate_name;
use crate::error::{missing, EngineError};
use crate::resolver::{permissions_for_role, resolve_attachment};
use crate::service::{Caller, GroupService};
use crate::views::{CustomPermission, MemberPermissions, PermissionChanges, ResolvedPermission};

fn validate_urn(urn: &str) -> Result<String, EngineError> {
    let urn = urn.trim();
    if !urn.starts_with("urn:") || urn.len() <= "urn:".len() {
        return Err(EngineError::validation(format!(
            "permission URN must start with 'urn:', got '{}'",
            urn
        )));
    }
    Ok(urn.to_string())
}

/// A group, its attachments and the registry entries they reference.
struct GroupGrants {
    group: Group,
    attachments: Vec<GroupPermission>,
    registry: HashMap<PermissionId, Permission>,
}

async fn load_grants<S: Store>(
    svc: &GroupService<S>,
    group: Group,
) -> Result<GroupGrants, EngineError> {
    let attachments = svc.store.list_group_permissions(&group.id).await?;

    let mut registry = HashMap::new();
    for attachment in &attachments {
        if let PermissionGrant::Global { permission_id } = &attachment.grant {
            if !registry.contains_key(permission_id) {
                let permission = svc
                    .store
                    .get_permission(permission_id)
                    .await
                    .map_err(missing("permission"))?;
                registry.insert(permission_id.clone(), permission);
            }
        }
    }

    Ok(GroupGrants {
        group,
        attachments,
        registry,
    })
}

impl GroupGrants {
    fn for_role(&self, role: GroupRole) -> Vec<ResolvedPermission> {
        permissions_for_role(&self.group, role, &self.attachments, &self.registry)
    }
}

/// Every member of a group with their role and resolved grants.
async fn member_permissions<S: Store>(
    svc: &GroupService<S>,
    group: Group,
) -> Result<Vec<MemberPermissions>, EngineError> {
    let admins: HashSet<UserId> = svc
        .store
        .list_group_admins(&group.id)
        .await?
        .into_iter()
        .map(|a| a.user_id)
        .collect();
    let members = svc.store.list_group_members(&group.id).await?;
    let grants = load_grants(svc, group).await?;

    Ok(members
        .into_iter()
        .map(|m| {
            let role = if m.user_id == grants.group.owner_id {
                GroupRole::Owner
            } else if admins.contains(&m.user_id) {
                GroupRole::Admin
            } else {
                GroupRole::Member
            };
            MemberPermissions {
                permissions: grants.for_role(role),
                user_id: m.user_id,
                role,
            }
        })
        .collect())
}

// ───────────────────────────── Registry ─────────────────────────────

pub async fn create_permission_category<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    mut params: CreatePermissionCategoryParams,
) -> Result<PermissionCategory, EngineError> {
    svc.require_global_admin(caller, "create permission categories")?;
    params.name = validate_name("permission category", &params.name)?;

    let category = svc
        .store
        .create_permission_category(&params)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => EngineError::conflict(format!(
                "permission category '{}' already exists",
                params.name
            )),
            other => other.into(),
        })?;

    info!(category_id = %category.id.0, name = %category.name, "permission category created");
    Ok(category)
}

pub async fn create_permission<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    mut params: CreatePermissionParams,
) -> Result<Permission, EngineError> {
    svc.require_global_admin(caller, "register permissions")?;
    params.urn = validate_urn(&params.urn)?;
    params.name = validate_name("permission", &params.name)?;

    let permission = svc
        .store
        .create_permission(&params)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => {
                EngineError::conflict(format!("permission '{}' already exists", params.urn))
            }
            other => other.into(),
        })?;

    info!(permission_id = %permission.id.0, urn = %permission.urn, "permission registered");
    Ok(permission)
}

// ───────────────────────────── Attachments ─────────────────────────────

pub async fn attach_permission<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    permission_id: &PermissionId,
    target_type: TargetType,
) -> Result<GroupPermission, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_owner_or_global_admin(&group, caller, "manage group permissions")?;

    let permission = svc
        .store
        .get_permission(permission_id)
        .await
        .map_err(missing("permission"))?;

    let attachment = svc
        .store
        .create_group_permission(&CreateGroupPermissionParams {
            group_id: group_id.clone(),
            grant: PermissionGrant::Global {
                permission_id: permission_id.clone(),
            },
            target_type,
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => EngineError::conflict(format!(
                "{} is already attached to this group",
                permission.urn
            )),
            other => other.into(),
        })?;

    info!(
        group_id = %group_id.0,
        urn = %permission.urn,
        target = target_type.as_str(),
        "permission attached"
    );
    Ok(attachment)
}

pub async fn create_group_scoped_permission<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    permission: CustomPermission,
    target_type: TargetType,
) -> Result<GroupPermission, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_owner_or_global_admin(&group, caller, "manage group permissions")?;

    let urn = validate_urn(&permission.urn)?;
    let name = validate_name("permission", &permission.name)?;

    let attachment = svc
        .store
        .create_group_permission(&CreateGroupPermissionParams {
            group_id: group_id.clone(),
            grant: PermissionGrant::Custom {
                urn: urn.clone(),
                name,
                description: permission.description,
            },
            target_type,
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => {
                EngineError::conflict(format!("{} is already defined on this group", urn))
            }
            other => other.into(),
        })?;

    info!(group_id = %group_id.0, urn = %urn, target = target_type.as_str(), "group permission created");
    Ok(attachment)
}

pub async fn update_group_permission<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_permission_id: &GroupPermissionId,
    changes: PermissionChanges,
) -> Result<GroupPermission, EngineError> {
    let current = svc
        .store
        .get_group_permission(group_permission_id)
        .await
        .map_err(missing("group permission"))?;
    let group = svc.load_group(&current.group_id).await?;
    svc.require_owner_or_global_admin(&group, caller, "manage group permissions")?;

    if current.grant.is_global() && (changes.name.is_some() || changes.description.is_some()) {
        return Err(EngineError::validation(
            "name and description of a global permission are managed in the registry",
        ));
    }

    let grant = match current.grant {
        global @ PermissionGrant::Global { .. } => global,
        PermissionGrant::Custom {
            urn,
            name,
            description,
        } => PermissionGrant::Custom {
            urn,
            name: match changes.name {
                Some(n) => validate_name("permission", &n)?,
                None => name,
            },
            description: changes.description.unwrap_or(description),
        },
    };

    let updated = svc
        .store
        .update_group_permission(
            group_permission_id,
            &UpdateGroupPermissionParams {
                grant,
                target_type: changes.target_type.unwrap_or(current.target_type),
            },
        )
        .await
        .map_err(missing("group permission"))?;

    info!(group_permission_id = %group_permission_id.0, "group permission updated");
    Ok(updated)
}

pub async fn remove_group_permission<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_permission_id: &GroupPermissionId,
) -> Result<(), EngineError> {
    let current = svc
        .store
        .get_group_permission(group_permission_id)
        .await
        .map_err(missing("group permission"))?;
    let group = svc.load_group(&current.group_id).await?;
    svc.require_owner_or_global_admin(&group, caller, "manage group permissions")?;

    svc.store
        .delete_group_permission(group_permission_id)
        .await
        .map_err(missing("group permission"))?;

    info!(group_permission_id = %group_permission_id.0, group_id = %group.id.0, "group permission removed");
    Ok(())
}

// ───────────────────────────── Resolution ─────────────────────────────

pub async fn get_group_permissions<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
) -> Result<Vec<ResolvedPermission>, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.visible_role(&group, caller).await?;

    let grants = load_grants(svc, group).await?;
    Ok(grants
        .attachments
        .iter()
        .filter_map(|a| resolve_attachment(&grants.group, a, &grants.registry))
        .collect())
}

pub async fn get_group_member_permissions<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
) -> Result<Vec<MemberPermissions>, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.visible_role(&group, caller).await?;

    member_permissions(svc, group).await
}

pub async fn get_user_permissions<S: Store>(
    svc: &GroupService<S>,
    user_id: &UserId,
) -> Result<Vec<ResolvedPermission>, EngineError> {
    let memberships = svc.store.list_user_memberships(user_id).await?;

    let mut resolved = Vec::new();
    for membership in memberships {
        let group = svc.load_group(&membership.group_id).await?;
        let role = svc.role_of(&group, user_id).await?;
        let grants = load_grants(svc, group).await?;
        resolved.extend(grants.for_role(role));
    }

    debug!(user_id = %user_id.0, count = resolved.len(), "resolved user permissions");
    Ok(resolved)
}

/// Per-user permissions across several groups. Identical URNs granted by
/// different groups are all kept, each with its own provenance.
pub async fn get_multi_group_member_permissions<S: Store>(
    svc: &GroupService<S>,
    group_ids: &[GroupId],
) -> Result<BTreeMap<UserId, Vec<ResolvedPermission>>, EngineError> {
    debug!(groups = group_ids.len(), "resolving member permissions across groups");

    let per_group = try_join_all(group_ids.iter().map(|group_id| async move {
        let group = svc.load_group(group_id).await?;
        member_permissions(svc, group).await
    }))
    .await?;

    let mut merged: BTreeMap<UserId, Vec<ResolvedPermission>> = BTreeMap::new();
    for member in per_group.into_iter().flatten() {
        merged
            .entry(member.user_id)
            .or_default()
            .extend(member.permissions);
    }
    Ok(merged)
}
