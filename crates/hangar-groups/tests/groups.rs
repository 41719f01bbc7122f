mod common;

use common::{harness, pilot};
use hangar_groups::{EngineError, NewGroup};
use hangar_storage::{
    CreateCategoryParams, GroupCreationPolicy, GroupFilter, GroupRole, JoinMode,
    UpdateCategoryParams, UpdateGroupParams, Visibility,
};

#[tokio::test]
async fn creator_becomes_sole_owner_and_member() {
    let h = harness().await;
    let owner = pilot();
    let group = h.group(&owner, "Mining Ops", JoinMode::Open).await;

    assert_eq!(group.owner_id, owner.user_id);

    let details = h.svc.get_group(&owner, &group.id).await.unwrap();
    assert_eq!(details.member_count, 1);
    assert_eq!(details.caller_role, GroupRole::Owner);
    assert!(details.admin_ids.is_empty());
    assert!(h.svc.is_group_admin(&group.id, &owner.user_id).await.unwrap());
}

#[tokio::test]
async fn admin_only_category_rejects_regular_users() {
    let h = harness().await;
    let restricted = h
        .category("Alliance Leadership", GroupCreationPolicy::AdminOnly)
        .await;

    let err = h
        .svc
        .create_group(
            &pilot(),
            NewGroup {
                category_id: restricted.id.clone(),
                name: "Directors".to_string(),
                description: None,
                visibility: Visibility::Public,
                join_mode: JoinMode::InvitationOnly,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let group = h
        .group_in(
            &restricted,
            &h.admin,
            "Directors",
            JoinMode::InvitationOnly,
            Visibility::Public,
        )
        .await;
    assert_eq!(group.owner_id, h.admin.user_id);
}

#[tokio::test]
async fn group_name_is_validated() {
    let h = harness().await;
    let category = h.category("Corporations", GroupCreationPolicy::Anyone).await;

    for name in ["   ".to_string(), "x".repeat(101)] {
        let err = h
            .svc
            .create_group(
                &pilot(),
                NewGroup {
                    category_id: category.id.clone(),
                    name,
                    description: None,
                    visibility: Visibility::Public,
                    join_mode: JoinMode::Open,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}

#[tokio::test]
async fn category_management_is_admin_only() {
    let h = harness().await;
    let user = pilot();

    let err = h
        .svc
        .create_category(
            &user,
            CreateCategoryParams {
                name: "Rogue".to_string(),
                description: None,
                visibility: Visibility::Public,
                allow_group_creation: GroupCreationPolicy::Anyone,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let category = h.category("Staff", GroupCreationPolicy::AdminOnly).await;
    h.svc
        .update_category(
            &h.admin,
            &category.id,
            UpdateCategoryParams {
                visibility: Some(Visibility::Hidden),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Hidden categories disappear for regular users
    assert!(h.svc.list_categories(&user).await.unwrap().is_empty());
    assert_eq!(h.svc.list_categories(&h.admin).await.unwrap().len(), 1);
    assert!(matches!(
        h.svc.get_category(&user, &category.id).await,
        Err(EngineError::NotFound("category"))
    ));
}

#[tokio::test]
async fn delete_category_requires_cascade_when_not_empty() {
    let h = harness().await;
    let owner = pilot();
    let category = h.category("Industry", GroupCreationPolicy::Anyone).await;
    let group = h
        .group_in(&category, &owner, "Builders", JoinMode::Open, Visibility::Public)
        .await;

    let err = h
        .svc
        .delete_category(&h.admin, &category.id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    h.svc
        .delete_category(&h.admin, &category.id, true)
        .await
        .unwrap();
    assert!(matches!(
        h.svc.get_group(&owner, &group.id).await,
        Err(EngineError::NotFound("group"))
    ));
}

#[tokio::test]
async fn hidden_and_system_groups_are_filtered() {
    let h = harness().await;
    let owner = pilot();
    let outsider = pilot();
    let category = h.category("Ops", GroupCreationPolicy::Anyone).await;

    h.group_in(&category, &owner, "Public Roam", JoinMode::Open, Visibility::Public)
        .await;
    let hidden = h
        .group_in(&category, &owner, "Cloaky Camp", JoinMode::InvitationOnly, Visibility::Hidden)
        .await;
    h.group_in(&category, &h.admin, "Auth Bots", JoinMode::InvitationOnly, Visibility::System)
        .await;

    let names = |groups: Vec<hangar_storage::Group>| -> Vec<String> {
        groups.into_iter().map(|g| g.name).collect()
    };

    let seen_by_outsider = h
        .svc
        .list_groups(&outsider, GroupFilter::default())
        .await
        .unwrap();
    assert_eq!(names(seen_by_outsider), vec!["Public Roam"]);

    let seen_by_owner = h
        .svc
        .list_groups(&owner, GroupFilter::default())
        .await
        .unwrap();
    assert_eq!(names(seen_by_owner), vec!["Cloaky Camp", "Public Roam"]);

    let seen_by_admin = h
        .svc
        .list_groups(&h.admin, GroupFilter::default())
        .await
        .unwrap();
    assert_eq!(seen_by_admin.len(), 3);

    assert!(matches!(
        h.svc.get_group(&outsider, &hidden.id).await,
        Err(EngineError::NotFound("group"))
    ));
}

#[tokio::test]
async fn only_owner_updates_and_deletes() {
    let h = harness().await;
    let owner = pilot();
    let member = pilot();
    let group = h.group_with_members(&owner, &[&member]).await;

    let err = h
        .svc
        .update_group(
            &member,
            &group.id,
            UpdateGroupParams {
                name: Some("Hijacked".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let updated = h
        .svc
        .update_group(
            &owner,
            &group.id,
            UpdateGroupParams {
                join_mode: Some(JoinMode::Approval),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.join_mode, JoinMode::Approval);

    assert!(matches!(
        h.svc.delete_group(&member, &group.id).await,
        Err(EngineError::Forbidden(_))
    ));
    h.svc.delete_group(&owner, &group.id).await.unwrap();
    assert!(h
        .svc
        .get_user_memberships(&member.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn system_visibility_changes_need_global_admin() {
    let h = harness().await;
    let owner = pilot();
    let category = h.category("Infrastructure", GroupCreationPolicy::Anyone).await;

    let public = h
        .group_in(&category, &owner, "Jump Bridges", JoinMode::Open, Visibility::Public)
        .await;
    let promote = UpdateGroupParams {
        visibility: Some(Visibility::System),
        ..Default::default()
    };
    assert!(matches!(
        h.svc.update_group(&owner, &public.id, promote).await,
        Err(EngineError::Forbidden(_))
    ));

    // Owner of a system group who no longer holds the admin flag
    let system = h
        .group_in(&category, &h.admin, "Auth Bots", JoinMode::InvitationOnly, Visibility::System)
        .await;
    let demoted = hangar_groups::Caller::user(h.admin.user_id.clone());
    let expose = || UpdateGroupParams {
        visibility: Some(Visibility::Public),
        ..Default::default()
    };
    assert!(matches!(
        h.svc.update_group(&demoted, &system.id, expose()).await,
        Err(EngineError::Forbidden(_))
    ));
    let rename = UpdateGroupParams {
        name: Some("Auth Bots v2".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        h.svc.update_group(&demoted, &system.id, rename).await,
        Err(EngineError::Forbidden(_))
    ));

    let exposed = h.svc.update_group(&h.admin, &system.id, expose()).await.unwrap();
    assert_eq!(exposed.visibility, Visibility::Public);
}

#[tokio::test]
async fn transfer_moves_ownership_and_keeps_previous_owner_as_admin() {
    let h = harness().await;
    let owner = pilot();
    let heir = pilot();
    let outsider = pilot();
    let group = h.group_with_members(&owner, &[&heir]).await;

    let err = h
        .svc
        .transfer_ownership(&owner, &group.id, &outsider.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let err = h
        .svc
        .transfer_ownership(&owner, &group.id, &owner.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    assert!(matches!(
        h.svc
            .transfer_ownership(&heir, &group.id, &heir.user_id)
            .await,
        Err(EngineError::Forbidden(_))
    ));

    let moved = h
        .svc
        .transfer_ownership(&owner, &group.id, &heir.user_id)
        .await
        .unwrap();
    assert_eq!(moved.owner_id, heir.user_id);

    let details = h.svc.get_group(&owner, &group.id).await.unwrap();
    assert_eq!(details.caller_role, GroupRole::Admin);
    assert!(details.admin_ids.contains(&owner.user_id));
    assert_eq!(details.member_count, 2);

    // A global admin may transfer on the owner's behalf
    let back = h
        .svc
        .transfer_ownership(&h.admin, &group.id, &owner.user_id)
        .await
        .unwrap();
    assert_eq!(back.owner_id, owner.user_id);
}
