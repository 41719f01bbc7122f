mod common;

use chrono::{Duration, Utc};
use common::{harness, pilot};
use hangar_groups::EngineError;
use hangar_storage::{CreateInviteCodeParams, JoinMode, Store};

#[tokio::test]
async fn three_use_code_round_trip() {
    let h = harness().await;
    let owner = pilot();
    let group = h.group(&owner, "Null Sec Renters", JoinMode::InvitationOnly).await;

    let code = h
        .svc
        .create_invite_code(&owner, &group.id, Some(3), 7)
        .await
        .unwrap();
    assert_eq!(code.code.len(), 16);
    assert!(code.code.chars().all(|c| c.is_ascii_alphanumeric()));

    let redeemers = [pilot(), pilot(), pilot()];
    for r in &redeemers {
        h.svc.redeem_invite_code(r, &code.code).await.unwrap();
    }

    assert!(matches!(
        h.svc.redeem_invite_code(&pilot(), &code.code).await,
        Err(EngineError::Conflict(_))
    ));

    let listed = h.svc.list_invite_codes(&owner, &group.id).await.unwrap();
    assert_eq!(listed[0].current_uses, 3);
    assert_eq!(listed[0].remaining_uses(), Some(0));

    let redemptions = h
        .svc
        .list_invite_code_redemptions(&owner, &code.id)
        .await
        .unwrap();
    assert_eq!(redemptions.len(), 3);
    assert_eq!(
        h.svc.get_group_members(&owner, &group.id).await.unwrap().len(),
        4
    );
}

#[tokio::test]
async fn concurrent_redemptions_never_exceed_max_uses() {
    let h = harness().await;
    let owner = pilot();
    let group = h.group(&owner, "Last Seat", JoinMode::InvitationOnly).await;
    let code = h
        .svc
        .create_invite_code(&owner, &group.id, Some(1), 1)
        .await
        .unwrap();

    let (a, b) = (pilot(), pilot());
    let (ra, rb) = tokio::join!(
        h.svc.redeem_invite_code(&a, &code.code),
        h.svc.redeem_invite_code(&b, &code.code)
    );

    let outcomes = [ra, rb];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(EngineError::Conflict(_)))));

    let stored = h.store.get_invite_code(&code.id).await.unwrap();
    assert_eq!(stored.current_uses, 1);
    assert_eq!(
        h.svc.get_group_members(&owner, &group.id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn redeem_after_revoke_is_invalid_state() {
    let h = harness().await;
    let owner = pilot();
    let admin = pilot();
    let group = h.group_with_members(&owner, &[&admin]).await;
    h.svc.add_admin(&owner, &group.id, &admin.user_id).await.unwrap();

    let code = h
        .svc
        .create_invite_code(&owner, &group.id, None, 30)
        .await
        .unwrap();
    let early = pilot();
    h.svc.redeem_invite_code(&early, &code.code).await.unwrap();

    // Only the owner revokes
    assert!(matches!(
        h.svc.revoke_invite_code(&admin, &code.id).await,
        Err(EngineError::Forbidden(_))
    ));
    let revoked = h.svc.revoke_invite_code(&owner, &code.id).await.unwrap();
    assert!(revoked.is_revoked());
    assert!(matches!(
        h.svc.revoke_invite_code(&owner, &code.id).await,
        Err(EngineError::InvalidState(_))
    ));

    assert!(matches!(
        h.svc.redeem_invite_code(&pilot(), &code.code).await,
        Err(EngineError::InvalidState(_))
    ));

    // Past redemptions survive the revocation
    let redemptions = h
        .svc
        .list_invite_code_redemptions(&admin, &code.id)
        .await
        .unwrap();
    assert_eq!(redemptions.len(), 1);
    assert_eq!(redemptions[0].user_id, early.user_id);
}

#[tokio::test]
async fn code_creation_is_validated() {
    let h = harness().await;
    let owner = pilot();
    let member = pilot();
    let group = h.group_with_members(&owner, &[&member]).await;

    for (max_uses, days) in [(None, 0), (None, 31), (Some(0), 7)] {
        assert!(matches!(
            h.svc
                .create_invite_code(&owner, &group.id, max_uses, days)
                .await,
            Err(EngineError::Validation(_))
        ));
    }
    assert!(matches!(
        h.svc.create_invite_code(&member, &group.id, None, 7).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        h.svc.list_invite_codes(&member, &group.id).await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn redeem_edge_cases() {
    let h = harness().await;
    let owner = pilot();
    let group = h.group(&owner, "Highsec Haulers", JoinMode::InvitationOnly).await;

    assert!(matches!(
        h.svc.redeem_invite_code(&pilot(), "doesnotexist1234").await,
        Err(EngineError::NotFound("invite code"))
    ));

    let code = h
        .svc
        .create_invite_code(&owner, &group.id, None, 7)
        .await
        .unwrap();
    assert!(matches!(
        h.svc.redeem_invite_code(&owner, &code.code).await,
        Err(EngineError::Conflict(_))
    ));

    let lapsed = h
        .store
        .create_invite_code(&CreateInviteCodeParams {
            group_id: group.id.clone(),
            code: "lapsedlapsed0001".to_string(),
            created_by: owner.user_id.clone(),
            max_uses: None,
            expires_at: Utc::now() - Duration::minutes(5),
        })
        .await
        .unwrap();
    assert!(matches!(
        h.svc.redeem_invite_code(&pilot(), &lapsed.code).await,
        Err(EngineError::Expired("invite code"))
    ));
}
