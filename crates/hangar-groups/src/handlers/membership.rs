//! Membership handlers: join, leave, remove, admin designation, listings

use std::collections::HashSet;

use hangar_storage::{GroupId, GroupMember, GroupRole, JoinMode, Store, StoreError, UserId};
use tracing::{info, warn};

use crate::error::{missing, EngineError};
use crate::service::{Caller, GroupService};
use crate::views::{MemberView, MembershipView};

pub async fn join_group<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
) -> Result<GroupMember, EngineError> {
    let group = svc.load_group(group_id).await?;
    let role = svc.visible_role(&group, caller).await?;

    if group.join_mode != JoinMode::Open {
        return Err(EngineError::invalid_state(format!(
            "group '{}' is not open; it requires {}",
            group.name,
            match group.join_mode {
                JoinMode::Approval => "an approved join request",
                _ => "an invitation",
            }
        )));
    }
    if role.is_member() {
        return Err(EngineError::conflict("already a member of this group"));
    }

    let member = svc
        .store
        .add_group_member(group_id, &caller.user_id)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => EngineError::conflict("already a member of this group"),
            other => other.into(),
        })?;

    info!(group_id = %group_id.0, user_id = %caller.user_id.0, "member joined");
    Ok(member)
}

pub async fn leave_group<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
) -> Result<(), EngineError> {
    let group = svc.load_group(group_id).await?;
    if group.owner_id == caller.user_id {
        return Err(EngineError::forbidden(
            "the owner cannot leave; transfer ownership first",
        ));
    }

    svc.store
        .remove_group_member(group_id, &caller.user_id)
        .await
        .map_err(missing("membership"))?;

    info!(group_id = %group_id.0, user_id = %caller.user_id.0, "member left");
    Ok(())
}

pub async fn remove_member<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<(), EngineError> {
    let group = svc.load_group(group_id).await?;
    let caller_role = svc
        .require_authority(&group, caller, "remove members")
        .await?;

    let target_role = svc.role_of(&group, user_id).await?;
    match target_role {
        GroupRole::None => return Err(EngineError::NotFound("membership")),
        GroupRole::Owner => {
            warn!(group_id = %group_id.0, user_id = %caller.user_id.0, "denied: removing the owner");
            return Err(EngineError::forbidden("the owner cannot be removed"));
        }
        GroupRole::Admin if caller_role != GroupRole::Owner => {
            warn!(group_id = %group_id.0, user_id = %caller.user_id.0, "denied: admin removing admin");
            return Err(EngineError::forbidden(
                "only the owner may remove a group admin",
            ));
        }
        _ => {}
    }

    svc.store
        .remove_group_member(group_id, user_id)
        .await
        .map_err(missing("membership"))?;

    info!(
        group_id = %group_id.0,
        user_id = %user_id.0,
        removed_by = %caller.user_id.0,
        "member removed"
    );
    Ok(())
}

pub async fn get_group_members<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
) -> Result<Vec<MemberView>, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.visible_role(&group, caller).await?;

    let admins: HashSet<UserId> = svc
        .store
        .list_group_admins(group_id)
        .await?
        .into_iter()
        .map(|a| a.user_id)
        .collect();

    let members = svc.store.list_group_members(group_id).await?;
    Ok(members
        .into_iter()
        .map(|m| {
            let role = if m.user_id == group.owner_id {
                GroupRole::Owner
            } else if admins.contains(&m.user_id) {
                GroupRole::Admin
            } else {
                GroupRole::Member
            };
            MemberView {
                user_id: m.user_id,
                role,
                joined_at: m.joined_at,
            }
        })
        .collect())
}

pub async fn get_user_memberships<S: Store>(
    svc: &GroupService<S>,
    user_id: &UserId,
) -> Result<Vec<MembershipView>, EngineError> {
    let memberships = svc.store.list_user_memberships(user_id).await?;

    let mut views = Vec::with_capacity(memberships.len());
    for membership in memberships {
        let group = svc.load_group(&membership.group_id).await?;
        let role = svc.role_of(&group, user_id).await?;
        views.push(MembershipView {
            group,
            role,
            joined_at: membership.joined_at,
        });
    }
    Ok(views)
}

pub async fn add_admin<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<(), EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_owner(&group, caller, "designate admins")?;

    match svc.role_of(&group, user_id).await? {
        GroupRole::Owner => return Ok(()),
        GroupRole::Admin => return Err(EngineError::conflict("user is already a group admin")),
        GroupRole::None => {
            return Err(EngineError::invalid_state(
                "only members can be made group admins",
            ))
        }
        GroupRole::Member => {}
    }

    svc.store
        .add_group_admin(group_id, user_id)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => EngineError::conflict("user is already a group admin"),
            other => other.into(),
        })?;

    info!(group_id = %group_id.0, user_id = %user_id.0, "group admin designated");
    Ok(())
}

pub async fn remove_admin<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<(), EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_owner(&group, caller, "remove admins")?;

    svc.store
        .remove_group_admin(group_id, user_id)
        .await
        .map_err(missing("group admin"))?;

    info!(group_id = %group_id.0, user_id = %user_id.0, "group admin removed");
    Ok(())
}

/// Explicit admin designation or ownership.
pub async fn is_group_admin<S: Store>(
    svc: &GroupService<S>,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<bool, EngineError> {
    let group = svc.load_group(group_id).await?;
    Ok(svc.role_of(&group, user_id).await?.has_admin_authority())
}
