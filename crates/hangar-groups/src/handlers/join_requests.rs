//! Join request handlers: create, list, approve/reject, cancel

use hangar_storage::{
    CreateJoinRequestParams, GroupId, GroupJoinRequest, JoinMode, JoinRequestId,
    JoinRequestStatus, Store, StoreError,
};
use tracing::{info, warn};

use crate::error::{missing, EngineError};
use crate::service::{Caller, GroupService};

pub(crate) const MAX_REASON_LEN: usize = 500;

pub async fn create_join_request<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    reason: Option<String>,
) -> Result<GroupJoinRequest, EngineError> {
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    if let Some(r) = &reason {
        if r.chars().count() > MAX_REASON_LEN {
            return Err(EngineError::validation(format!(
                "reason must be at most {} characters",
                MAX_REASON_LEN
            )));
        }
    }

    let group = svc.load_group(group_id).await?;
    let role = svc.visible_role(&group, caller).await?;

    if role.is_member() {
        return Err(EngineError::conflict("already a member of this group"));
    }
    match group.join_mode {
        JoinMode::Approval => {}
        JoinMode::InvitationOnly => {
            return Err(EngineError::conflict(
                "group only accepts members by invitation",
            ))
        }
        JoinMode::Open => {
            return Err(EngineError::invalid_state(
                "group is open; join it directly",
            ))
        }
    }

    let request = svc
        .store
        .create_join_request(&CreateJoinRequestParams {
            group_id: group_id.clone(),
            user_id: caller.user_id.clone(),
            reason,
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => {
                EngineError::conflict("a join request is already pending for this group")
            }
            other => other.into(),
        })?;

    info!(request_id = %request.id.0, group_id = %group_id.0, user_id = %caller.user_id.0, "join request created");
    Ok(request)
}

pub async fn list_join_requests<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    status: Option<JoinRequestStatus>,
) -> Result<Vec<GroupJoinRequest>, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_authority(&group, caller, "view join requests")
        .await?;

    Ok(svc.store.list_join_requests(group_id, status).await?)
}

pub async fn list_user_join_requests<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
) -> Result<Vec<GroupJoinRequest>, EngineError> {
    Ok(svc.store.list_user_join_requests(&caller.user_id).await?)
}

/// Approve or reject a pending request.
pub async fn respond_join_request<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    request_id: &JoinRequestId,
    decision: JoinRequestStatus,
) -> Result<GroupJoinRequest, EngineError> {
    let request = svc
        .store
        .get_join_request(request_id)
        .await
        .map_err(missing("join request"))?;

    let group = svc.load_group(&request.group_id).await?;
    svc.require_authority(&group, caller, "respond to join requests")
        .await?;

    if request.status != JoinRequestStatus::Pending {
        return Err(EngineError::invalid_state(format!(
            "join request is already {}",
            request.status.as_str()
        )));
    }

    let responded = svc
        .store
        .respond_join_request(request_id, decision, &caller.user_id)
        .await
        .map_err(|e| match e {
            StoreError::Conflict => EngineError::invalid_state("join request is no longer pending"),
            other => missing("join request")(other),
        })?;

    info!(
        request_id = %request_id.0,
        group_id = %group.id.0,
        user_id = %responded.user_id.0,
        decision = decision.as_str(),
        "join request answered"
    );
    Ok(responded)
}

pub async fn cancel_join_request<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    request_id: &JoinRequestId,
) -> Result<(), EngineError> {
    let request = svc
        .store
        .get_join_request(request_id)
        .await
        .map_err(missing("join request"))?;

    if request.user_id != caller.user_id {
        warn!(request_id = %request_id.0, user_id = %caller.user_id.0, "denied: not the requester");
        return Err(EngineError::forbidden(
            "only the requester may cancel a join request",
        ));
    }
    if request.status != JoinRequestStatus::Pending {
        return Err(EngineError::invalid_state(format!(
            "join request is already {}",
            request.status.as_str()
        )));
    }

    svc.store
        .delete_join_request(request_id)
        .await
        .map_err(|e| match e {
            StoreError::Conflict => EngineError::invalid_state("join request is no longer pending"),
            other => missing("join request")(other),
        })?;

    info!(request_id = %request_id.0, user_id = %caller.user_id.0, "join request cancelled");
    Ok(())
}
