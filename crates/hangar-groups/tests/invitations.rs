mod common;

use common::{harness, pilot};
use hangar_groups::EngineError;
use hangar_storage::{InvitationStatus, JoinMode};

#[tokio::test]
async fn invite_and_accept_through_linked_character() {
    let h = harness().await;
    let owner = pilot();
    let recruit = pilot();
    let group = h.group(&owner, "Wormhole Division", JoinMode::InvitationOnly).await;
    h.character(2114794365, "Katia Sae", Some(&recruit));

    let inv = h
        .svc
        .create_invitation(&owner, &group.id, "katia sae")
        .await
        .unwrap();
    assert_eq!(inv.status, InvitationStatus::Pending);
    assert_eq!(inv.invitee_user_id, Some(recruit.user_id.clone()));
    assert!(inv.expires_at > inv.created_at);

    let pending = h.svc.list_pending_invitations(&recruit).await.unwrap();
    assert_eq!(pending.len(), 1);

    // Someone else cannot accept it
    assert!(matches!(
        h.svc.accept_invitation(&pilot(), &inv.id).await,
        Err(EngineError::Forbidden(_))
    ));

    let accepted = h.svc.accept_invitation(&recruit, &inv.id).await.unwrap();
    assert_eq!(accepted.status, InvitationStatus::Accepted);
    assert_eq!(
        h.svc
            .get_user_memberships(&recruit.user_id)
            .await
            .unwrap()
            .len(),
        1
    );

    // Already answered
    assert!(matches!(
        h.svc.accept_invitation(&recruit, &inv.id).await,
        Err(EngineError::NotFound("invitation"))
    ));
    assert!(matches!(
        h.svc.decline_invitation(&recruit, &inv.id).await,
        Err(EngineError::InvalidState(_))
    ));
}

#[tokio::test]
async fn unlinked_character_is_resolved_at_accept_time() {
    let h = harness().await;
    let owner = pilot();
    let later = pilot();
    let group = h.group(&owner, "Explorers", JoinMode::InvitationOnly).await;
    let character = h.character(95538921, "Lonely Scout", None);

    let inv = h
        .svc
        .create_invitation(&owner, &group.id, "Lonely Scout")
        .await
        .unwrap();
    assert!(inv.invitee_user_id.is_none());

    // The character gets linked to an account after the invite went out
    assert!(h.directory.link(character, later.user_id.clone()));

    let accepted = h.svc.accept_invitation(&later, &inv.id).await.unwrap();
    assert_eq!(accepted.invitee_user_id, Some(later.user_id.clone()));
    let members = h.svc.get_group_members(&owner, &group.id).await.unwrap();
    assert!(members.iter().any(|m| m.user_id == later.user_id));
}

#[tokio::test]
async fn invitation_conflicts_and_permissions() {
    let h = harness().await;
    let owner = pilot();
    let member = pilot();
    let group = h.group_with_members(&owner, &[&member]).await;
    h.character(1, "Already In", Some(&member));
    h.character(2, "Fresh Face", None);

    assert!(matches!(
        h.svc.create_invitation(&owner, &group.id, "Nobody Known").await,
        Err(EngineError::NotFound("character"))
    ));
    assert!(matches!(
        h.svc.create_invitation(&owner, &group.id, "Already In").await,
        Err(EngineError::Conflict(_))
    ));
    assert!(matches!(
        h.svc.create_invitation(&member, &group.id, "Fresh Face").await,
        Err(EngineError::Forbidden(_))
    ));

    h.svc
        .create_invitation(&owner, &group.id, "Fresh Face")
        .await
        .unwrap();
    assert!(matches!(
        h.svc.create_invitation(&owner, &group.id, "Fresh Face").await,
        Err(EngineError::Conflict(_))
    ));

    // Group admins may invite too, and see the group's invitations
    h.svc.add_admin(&owner, &group.id, &member.user_id).await.unwrap();
    let listed = h.svc.get_group_invitations(&member, &group.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(matches!(
        h.svc.get_group_invitations(&pilot(), &group.id).await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn decline_closes_the_invitation() {
    let h = harness().await;
    let owner = pilot();
    let invitee = pilot();
    let group = h.group(&owner, "Faction Warfare", JoinMode::InvitationOnly).await;
    h.character(3, "Maybe Later", Some(&invitee));

    let inv = h
        .svc
        .create_invitation(&owner, &group.id, "Maybe Later")
        .await
        .unwrap();
    let declined = h.svc.decline_invitation(&invitee, &inv.id).await.unwrap();
    assert_eq!(declined.status, InvitationStatus::Declined);
    assert!(h.svc.list_pending_invitations(&invitee).await.unwrap().is_empty());
    assert!(h
        .svc
        .get_user_memberships(&invitee.user_id)
        .await
        .unwrap()
        .is_empty());

    // A new invitation can be sent after a decline
    h.svc
        .create_invitation(&owner, &group.id, "Maybe Later")
        .await
        .unwrap();
}

#[tokio::test]
async fn lapsed_invitation_reports_expired_and_can_be_replaced() {
    use chrono::{Duration, Utc};
    use hangar_storage::{CreateInvitationParams, Store};

    let h = harness().await;
    let owner = pilot();
    let invitee = pilot();
    let group = h.group(&owner, "Incursions", JoinMode::InvitationOnly).await;
    let character = h.character(4, "Slow Reader", Some(&invitee));

    let lapsed = h
        .store
        .create_invitation(&CreateInvitationParams {
            group_id: group.id.clone(),
            inviter_id: owner.user_id.clone(),
            invitee_character_id: character,
            invitee_character_name: "Slow Reader".to_string(),
            invitee_user_id: Some(invitee.user_id.clone()),
            expires_at: Utc::now() - Duration::hours(1),
        })
        .await
        .unwrap();

    assert!(matches!(
        h.svc.accept_invitation(&invitee, &lapsed.id).await,
        Err(EngineError::Expired("invitation"))
    ));
    assert!(matches!(
        h.svc.decline_invitation(&invitee, &lapsed.id).await,
        Err(EngineError::Expired("invitation"))
    ));
    assert!(h.svc.list_pending_invitations(&invitee).await.unwrap().is_empty());

    let listed = h.svc.get_group_invitations(&owner, &group.id).await.unwrap();
    assert_eq!(listed[0].status, InvitationStatus::Expired);

    // The lapsed one is closed and a fresh invitation takes its place
    let fresh = h
        .svc
        .create_invitation(&owner, &group.id, "Slow Reader")
        .await
        .unwrap();
    assert_eq!(fresh.status, InvitationStatus::Pending);
    assert_eq!(
        h.store.get_invitation(&lapsed.id).await.unwrap().status,
        InvitationStatus::Expired
    );
}

/// Directory that parks every name lookup until released.
struct ParkedDirectory {
    inner: hangar_groups::MemoryCharacterDirectory,
    entered: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

#[async_trait::async_trait]
impl hangar_groups::CharacterDirectory for ParkedDirectory {
    async fn resolve_character(
        &self,
        name: &str,
    ) -> Result<Option<hangar_groups::CharacterRef>, hangar_groups::DirectoryError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.resolve_character(name).await
    }

    async fn characters_for_user(
        &self,
        user_id: &hangar_storage::UserId,
    ) -> Result<Vec<hangar_storage::CharacterId>, hangar_groups::DirectoryError> {
        self.inner.characters_for_user(user_id).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_character_lookup_does_not_stall_other_groups() {
    use std::sync::Arc;
    use std::time::Duration;

    use hangar_groups::{CharacterRef, EngineConfig, GroupService};
    use hangar_storage::CharacterId;

    let h = harness().await;
    let owner = pilot();
    let joiner = pilot();
    let recruiting = h.group(&owner, "Null Sec Logistics", JoinMode::InvitationOnly).await;
    let open = h.group(&owner, "Mining Ops", JoinMode::Open).await;

    let directory = Arc::new(ParkedDirectory {
        inner: hangar_groups::MemoryCharacterDirectory::new(),
        entered: tokio::sync::Notify::new(),
        release: tokio::sync::Notify::new(),
    });
    directory.inner.insert(CharacterRef {
        character_id: CharacterId(90000001),
        character_name: "Patient Pilot".to_string(),
        user_id: None,
    });
    let svc = Arc::new(GroupService::new(
        h.store.clone(),
        directory.clone(),
        EngineConfig::default(),
    ));

    let invite = tokio::spawn({
        let svc = svc.clone();
        let owner = owner.clone();
        let group_id = recruiting.id.clone();
        async move {
            svc.create_invitation(&owner, &group_id, "Patient Pilot")
                .await
        }
    });
    directory.entered.notified().await;

    // The lookup for the first group is still parked
    let details = tokio::time::timeout(Duration::from_secs(5), async {
        svc.join_group(&joiner, &open.id).await.unwrap();
        svc.get_group(&joiner, &open.id).await.unwrap()
    })
    .await
    .expect("unrelated group waited on a character lookup");
    assert_eq!(details.member_count, 2);

    directory.release.notify_one();
    let invitation = invite.await.unwrap().unwrap();
    assert_eq!(invitation.group_id, recruiting.id);
    assert_eq!(invitation.status, InvitationStatus::Pending);
}
