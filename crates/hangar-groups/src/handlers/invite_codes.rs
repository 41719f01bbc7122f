//! Invite code handlers: create, list, revoke, redeem

use chrono::{Duration, Utc};
use hangar_storage::{
    CreateInviteCodeParams, GroupId, GroupInviteCode, InviteCodeId, InviteCodeRedemption, Store,
    StoreError,
};
use rand::{distr::Alphanumeric, Rng};
use tracing::{info, warn};

use crate::error::{missing, EngineError};
use crate::service::{Caller, GroupService};

/// Random alphanumeric code of `len` characters.
pub(crate) fn generate_code(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub async fn create_invite_code<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
    max_uses: Option<u32>,
    expires_in_days: u32,
) -> Result<GroupInviteCode, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_owner(&group, caller, "create invite codes")?;

    let max_days = svc.config.invite_code_max_days;
    if !(1..=max_days).contains(&expires_in_days) {
        return Err(EngineError::validation(format!(
            "expires_in_days must be between 1 and {}",
            max_days
        )));
    }
    if max_uses == Some(0) {
        return Err(EngineError::validation("max_uses must be at least 1"));
    }

    let code = generate_code(svc.config.invite_code_length as usize);
    let invite = svc
        .store
        .create_invite_code(&CreateInviteCodeParams {
            group_id: group_id.clone(),
            code,
            created_by: caller.user_id.clone(),
            max_uses,
            expires_at: Utc::now() + Duration::days(i64::from(expires_in_days)),
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => EngineError::conflict("invite code collision, try again"),
            other => other.into(),
        })?;

    info!(
        code_id = %invite.id.0,
        group_id = %group_id.0,
        max_uses = ?invite.max_uses,
        expires_at = %invite.expires_at,
        "invite code created"
    );
    Ok(invite)
}

pub async fn list_invite_codes<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    group_id: &GroupId,
) -> Result<Vec<GroupInviteCode>, EngineError> {
    let group = svc.load_group(group_id).await?;
    svc.require_authority(&group, caller, "view invite codes")
        .await?;

    Ok(svc.store.list_invite_codes(group_id).await?)
}

pub async fn revoke_invite_code<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    code_id: &InviteCodeId,
) -> Result<GroupInviteCode, EngineError> {
    let invite = svc
        .store
        .get_invite_code(code_id)
        .await
        .map_err(missing("invite code"))?;
    let group = svc.load_group(&invite.group_id).await?;
    svc.require_owner(&group, caller, "revoke invite codes")?;

    if invite.is_revoked() {
        return Err(EngineError::invalid_state("invite code is already revoked"));
    }

    let revoked = svc
        .store
        .revoke_invite_code(code_id, Utc::now())
        .await
        .map_err(|e| match e {
            StoreError::Conflict => EngineError::invalid_state("invite code is already revoked"),
            other => missing("invite code")(other),
        })?;

    info!(code_id = %code_id.0, group_id = %group.id.0, "invite code revoked");
    Ok(revoked)
}

pub async fn redeem_invite_code<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    code: &str,
) -> Result<InviteCodeRedemption, EngineError> {
    let invite = svc
        .store
        .get_invite_code_by_code(code.trim())
        .await
        .map_err(missing("invite code"))?;

    let now = Utc::now();
    if invite.is_revoked() {
        return Err(EngineError::invalid_state("invite code has been revoked"));
    }
    if invite.is_expired(now) {
        return Err(EngineError::Expired("invite code"));
    }
    if invite.is_exhausted() {
        return Err(EngineError::conflict("invite code has no uses left"));
    }

    let group = svc.load_group(&invite.group_id).await?;
    if svc.role_of(&group, &caller.user_id).await?.is_member() {
        return Err(EngineError::conflict("already a member of this group"));
    }

    let redemption = svc
        .store
        .redeem_invite_code(&invite.id, &caller.user_id, now)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => EngineError::conflict("already a member of this group"),
            StoreError::Conflict => {
                warn!(code_id = %invite.id.0, "redemption lost a race for the last use");
                EngineError::conflict("invite code has no uses left")
            }
            other => missing("invite code")(other),
        })?;

    info!(
        code_id = %invite.id.0,
        group_id = %group.id.0,
        user_id = %caller.user_id.0,
        "invite code redeemed"
    );
    Ok(redemption)
}

pub async fn list_invite_code_redemptions<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    code_id: &InviteCodeId,
) -> Result<Vec<InviteCodeRedemption>, EngineError> {
    let invite = svc
        .store
        .get_invite_code(code_id)
        .await
        .map_err(missing("invite code"))?;
    let group = svc.load_group(&invite.group_id).await?;
    svc.require_authority(&group, caller, "view redemptions")
        .await?;

    Ok(svc.store.list_invite_code_redemptions(code_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_alphanumeric() {
        let code = generate_code(16);
        assert_eq!(code.len(), 16);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_code(16), code);
    }
}
