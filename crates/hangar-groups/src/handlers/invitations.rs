//! Invitation handlers: create, list, accept, decline

use chrono::{Duration, Utc};
use hangar_storage::{
    CharacterId, CreateInvitationParams, GroupId, GroupInvitation, InvitationId,
    InvitationStatus, Store, StoreError,
};
use tracing::{debug, info, warn};

use crate::directory::CharacterRef;
use crate::error::{missing, EngineError};
use crate::service::{Caller, GroupService};

pub async fn create_invitation<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    character: Option<CharacterRef>,
) -> Result<GroupInvitation, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_authority(&group, caller, "invite characters")
        .await?;

    let character = character.ok_or(EngineError::NotFound("character"))?;

    let now = Utc::now();
    if let Some(existing) = svc
        .store
        .find_pending_invitation(group_id, &character.character_id)
        .await?
    {
        if !existing.is_expired(now) {
            return Err(EngineError::conflict(format!(
                "{} already has a pending invitation",
                character.character_name
            )));
        }
        // Lapsed but never answered; close it to make room for the new one.
        svc.store
            .close_invitation(&existing.id, InvitationStatus::Expired)
            .await?;
        debug!(invitation_id = %existing.id.0, "closed lapsed invitation");
    }

    if let Some(user_id) = &character.user_id {
        if svc.role_of(&group, user_id).await?.is_member() {
            return Err(EngineError::conflict(format!(
                "{} is already a member",
                character.character_name
            )));
        }
    }

    let invitation = svc
        .store
        .create_invitation(&CreateInvitationParams {
            group_id: group_id.clone(),
            inviter_id: caller.user_id.clone(),
            invitee_character_id: character.character_id,
            invitee_character_name: character.character_name.clone(),
            invitee_user_id: character.user_id.clone(),
            expires_at: now + Duration::days(i64::from(svc.config.invitation_ttl_days)),
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => EngineError::conflict(format!(
                "{} already has a pending invitation",
                character.character_name
            )),
            other => other.into(),
        })?;

    info!(
        invitation_id = %invitation.id.0,
        group_id = %group_id.0,
        character_id = invitation.invitee_character_id.0,
        "invitation created"
    );
    Ok(invitation)
}

pub async fn list_pending_invitations<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    characters: &[CharacterId],
) -> Result<Vec<GroupInvitation>, EngineError> {
    let now = Utc::now();

    Ok(svc
        .store
        .list_pending_invitations_for(&caller.user_id, characters)
        .await?
        .into_iter()
        .filter(|inv| !inv.is_expired(now))
        .collect())
}

pub async fn get_group_invitations<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
) -> Result<Vec<GroupInvitation>, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_authority(&group, caller, "view invitations")
        .await?;

    let now = Utc::now();
    Ok(svc
        .store
        .list_group_invitations(group_id)
        .await?
        .into_iter()
        .map(|mut inv| {
            inv.status = inv.effective_status(now);
            inv
        })
        .collect())
}

/// Whether `caller` is the invitee, directly or through one of their characters.
fn is_invitee(caller: &Caller, characters: &[CharacterId], invitation: &GroupInvitation) -> bool {
    invitation.invitee_user_id.as_ref() == Some(&caller.user_id)
        || characters.contains(&invitation.invitee_character_id)
}

pub async fn accept_invitation<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    invitation_id: &InvitationId,
    characters: &[CharacterId],
) -> Result<GroupInvitation, EngineError> {
    let invitation = svc
        .store
        .get_invitation(invitation_id)
        .await
        .map_err(missing("invitation"))?;

    if invitation.status != InvitationStatus::Pending {
        return Err(EngineError::NotFound("invitation"));
    }
    if invitation.is_expired(Utc::now()) {
        return Err(EngineError::Expired("invitation"));
    }
    if !is_invitee(caller, characters, &invitation) {
        warn!(invitation_id = %invitation_id.0, user_id = %caller.user_id.0, "denied: not the invitee");
        return Err(EngineError::forbidden("invitation is addressed to someone else"));
    }

    let accepted = svc
        .store
        .accept_invitation(invitation_id, &caller.user_id)
        .await
        .map_err(|e| match e {
            StoreError::Conflict | StoreError::NotFound => EngineError::NotFound("invitation"),
            other => other.into(),
        })?;

    info!(
        invitation_id = %invitation_id.0,
        group_id = %accepted.group_id.0,
        user_id = %caller.user_id.0,
        "invitation accepted"
    );
    Ok(accepted)
}

pub async fn decline_invitation<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    invitation_id: &InvitationId,
    characters: &[CharacterId],
) -> Result<GroupInvitation, EngineError> {
    let invitation = svc
        .store
        .get_invitation(invitation_id)
        .await
        .map_err(missing("invitation"))?;

    if invitation.status != InvitationStatus::Pending {
        return Err(EngineError::invalid_state(format!(
            "invitation is already {}",
            invitation.status.as_str()
        )));
    }
    if invitation.is_expired(Utc::now()) {
        return Err(EngineError::Expired("invitation"));
    }
    if !is_invitee(caller, characters, &invitation) {
        warn!(invitation_id = %invitation_id.0, user_id = %caller.user_id.0, "denied: not the invitee");
        return Err(EngineError::forbidden("invitation is addressed to someone else"));
    }

    let declined = svc
        .store
        .close_invitation(invitation_id, InvitationStatus::Declined)
        .await
        .map_err(|e| match e {
            StoreError::Conflict => EngineError::invalid_state("invitation is no longer pending"),
            other => missing("invitation")(other),
        })?;

    info!(invitation_id = %invitation_id.0, user_id = %caller.user_id.0, "invitation declined");
    Ok(declined)
}
