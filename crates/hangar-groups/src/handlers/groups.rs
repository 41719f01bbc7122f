//! Group handlers: create, list, get, update, delete, ownership transfer

use std::collections::HashSet;

use hangar_storage::{
    CreateGroupParams, Group, GroupCreationPolicy, GroupFilter, GroupId, GroupRole, Store,
    StoreError, UpdateGroupParams, UserId, Visibility,
};
use tracing::{info, warn};

use super::validate_name;
use crate::error::{missing, EngineError};
use crate::service::{Caller, GroupService};
use crate::views::{GroupDetails, NewGroup};

pub async fn create_group<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    new: NewGroup,
) -> Result<Group, EngineError> {
    let name = validate_name("group", &new.name)?;

    let category = svc
        .store
        .get_category(&new.category_id)
        .await
        .map_err(missing("category"))?;

    let restricted = category.allow_group_creation == GroupCreationPolicy::AdminOnly
        || category.visibility == Visibility::System
        || new.visibility == Visibility::System;
    if restricted && !caller.is_admin {
        warn!(category_id = %category.id.0, user_id = %caller.user_id.0, "denied: group creation restricted");
        return Err(EngineError::forbidden(format!(
            "only administrators may create groups in '{}'",
            category.name
        )));
    }

    let group = svc
        .store
        .create_group(&CreateGroupParams {
            category_id: category.id.clone(),
            name: name.clone(),
            description: new.description,
            visibility: new.visibility,
            join_mode: new.join_mode,
            owner_id: caller.user_id.clone(),
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => EngineError::conflict(format!(
                "group '{}' already exists in '{}'",
                name, category.name
            )),
            other => other.into(),
        })?;

    info!(group_id = %group.id.0, owner_id = %group.owner_id.0, name = %group.name, "group created");
    Ok(group)
}

pub async fn list_groups<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    filter: GroupFilter,
) -> Result<Vec<Group>, EngineError> {
    let groups = svc.store.list_groups(&filter).await?;
    if caller.is_admin {
        return Ok(groups);
    }

    // Group admins are always members, so membership covers both.
    let joined: HashSet<GroupId> = svc
        .store
        .list_user_memberships(&caller.user_id)
        .await?
        .into_iter()
        .map(|m| m.group_id)
        .collect();

    Ok(groups
        .into_iter()
        .filter(|g| match g.visibility {
            Visibility::Public => true,
            Visibility::Hidden => joined.contains(&g.id),
            Visibility::System => false,
        })
        .collect())
}

pub async fn get_group<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
) -> Result<GroupDetails, EngineError> {
    let group = svc.load_group(group_id).await?;
    let caller_role = svc.visible_role(&group, caller).await?;

    let admin_ids = svc
        .store
        .list_group_admins(group_id)
        .await?
        .into_iter()
        .map(|a| a.user_id)
        .collect();
    let member_count = svc.store.list_group_members(group_id).await?.len();

    Ok(GroupDetails {
        group,
        admin_ids,
        member_count,
        caller_role,
    })
}

pub async fn update_group<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    mut params: UpdateGroupParams,
) -> Result<Group, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_owner(&group, caller, "update the group")?;

    if let Some(name) = params.name.take() {
        params.name = Some(validate_name("group", &name)?);
    }
    let touches_system = group.visibility == Visibility::System
        || params.visibility == Some(Visibility::System);
    if touches_system && !caller.is_admin {
        warn!(group_id = %group_id.0, user_id = %caller.user_id.0, "denied: system group update");
        return Err(EngineError::forbidden(
            "only administrators may update system groups",
        ));
    }

    let updated = svc
        .store
        .update_group(group_id, &params)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => {
                EngineError::conflict("another group in this category already uses that name")
            }
            other => missing("group")(other),
        })?;

    info!(group_id = %group_id.0, "group updated");
    Ok(updated)
}

pub async fn delete_group<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
) -> Result<(), EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_owner(&group, caller, "delete the group")?;

    svc.store
        .delete_group(group_id)
        .await
        .map_err(missing("group"))?;

    info!(group_id = %group_id.0, name = %group.name, "group deleted");
    Ok(())
}

pub async fn transfer_ownership<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    new_owner_id: &UserId,
) -> Result<Group, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_owner_or_global_admin(&group, caller, "transfer ownership")?;

    if group.owner_id == *new_owner_id {
        return Err(EngineError::invalid_state("user already owns the group"));
    }
    if svc.role_of(&group, new_owner_id).await? == GroupRole::None {
        return Err(EngineError::invalid_state(
            "new owner must be a member of the group",
        ));
    }

    let updated = svc
        .store
        .transfer_group_ownership(group_id, new_owner_id)
        .await
        .map_err(|e| match e {
            StoreError::Conflict => {
                EngineError::invalid_state("new owner must be a member of the group")
            }
            other => missing("group")(other),
        })?;

    info!(
        group_id = %group_id.0,
        previous_owner = %group.owner_id.0,
        new_owner = %new_owner_id.0,
        "group ownership transferred"
    );
    Ok(updated)
}
