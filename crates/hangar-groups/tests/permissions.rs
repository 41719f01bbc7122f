mod common;

use common::{harness, pilot, Harness};
use hangar_groups::{Caller, CustomPermission, EngineError, PermissionChanges, PermissionSource};
use hangar_storage::{
    CreatePermissionCategoryParams, CreatePermissionParams, Group, Permission, TargetType,
};

async fn register(h: &Harness, urn: &str, name: &str) -> Permission {
    h.svc
        .create_permission(
            &h.admin,
            CreatePermissionParams {
                urn: urn.to_string(),
                name: name.to_string(),
                description: None,
                category_id: None,
            },
        )
        .await
        .unwrap()
}

async fn custom(h: &Harness, caller: &Caller, group: &Group, urn: &str, target: TargetType) {
    h.svc
        .create_group_scoped_permission(
            caller,
            &group.id,
            CustomPermission {
                urn: urn.to_string(),
                name: urn.trim_start_matches("urn:").to_string(),
                description: None,
            },
            target,
        )
        .await
        .unwrap();
}

fn urns(perms: &[hangar_groups::ResolvedPermission]) -> Vec<&str> {
    let mut urns: Vec<&str> = perms.iter().map(|p| p.urn.as_str()).collect();
    urns.sort();
    urns
}

#[tokio::test]
async fn owner_only_resolution() {
    let h = harness().await;
    let owner = pilot();
    let admin = pilot();
    let member = pilot();
    let group = h.group_with_members(&owner, &[&admin, &member]).await;
    h.svc.add_admin(&owner, &group.id, &admin.user_id).await.unwrap();

    custom(&h, &owner, &group, "urn:fleet:x", TargetType::OwnerOnly).await;

    assert_eq!(
        urns(&h.svc.get_user_permissions(&owner.user_id).await.unwrap()),
        vec!["urn:fleet:x"]
    );
    assert!(h
        .svc
        .get_user_permissions(&admin.user_id)
        .await
        .unwrap()
        .is_empty());
    assert!(h
        .svc
        .get_user_permissions(&member.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn target_types_resolve_by_role() {
    let h = harness().await;
    let owner = pilot();
    let admin = pilot();
    let member = pilot();
    let group = h.group_with_members(&owner, &[&admin, &member]).await;
    h.svc.add_admin(&owner, &group.id, &admin.user_id).await.unwrap();

    let comms = register(&h, "urn:hangar:comms:read", "Read comms").await;
    h.svc
        .attach_permission(&owner, &group.id, &comms.id, TargetType::AllMembers)
        .await
        .unwrap();
    custom(&h, &owner, &group, "urn:fleet:admins", TargetType::AllAdmins).await;
    custom(&h, &owner, &group, "urn:fleet:leads", TargetType::OwnerAndAdmins).await;

    let per_member = h
        .svc
        .get_group_member_permissions(&member, &group.id)
        .await
        .unwrap();
    assert_eq!(per_member.len(), 3);
    for entry in &per_member {
        let got = urns(&entry.permissions);
        if entry.user_id == member.user_id {
            assert_eq!(got, vec!["urn:hangar:comms:read"]);
        } else {
            assert_eq!(
                got,
                vec!["urn:fleet:admins", "urn:fleet:leads", "urn:hangar:comms:read"]
            );
        }
    }

    let all = h.svc.get_group_permissions(&member, &group.id).await.unwrap();
    assert_eq!(all.len(), 3);
    let global = all
        .iter()
        .find(|p| p.urn == "urn:hangar:comms:read")
        .unwrap();
    assert_eq!(global.source, PermissionSource::Global);
    assert_eq!(global.group_name, group.name);
}

#[tokio::test]
async fn attachment_rules() {
    let h = harness().await;
    let owner = pilot();
    let member = pilot();
    let group = h.group_with_members(&owner, &[&member]).await;
    let perm = register(&h, "urn:hangar:srp:submit", "Submit SRP").await;

    assert!(matches!(
        h.svc
            .attach_permission(&member, &group.id, &perm.id, TargetType::AllMembers)
            .await,
        Err(EngineError::Forbidden(_))
    ));

    // Global admins may manage any group's permissions
    let attached = h
        .svc
        .attach_permission(&h.admin, &group.id, &perm.id, TargetType::AllMembers)
        .await
        .unwrap();
    assert!(matches!(
        h.svc
            .attach_permission(&owner, &group.id, &perm.id, TargetType::OwnerOnly)
            .await,
        Err(EngineError::Conflict(_))
    ));

    for (urn, name) in [("fleet:no-prefix", "x"), ("urn:ok", "  ")] {
        let err = h
            .svc
            .create_group_scoped_permission(
                &owner,
                &group.id,
                CustomPermission {
                    urn: urn.to_string(),
                    name: name.to_string(),
                    description: None,
                },
                TargetType::AllMembers,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    // Global grants keep their registry name
    assert!(matches!(
        h.svc
            .update_group_permission(
                &owner,
                &attached.id,
                PermissionChanges {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        h.svc
            .update_group_permission(
                &owner,
                &attached.id,
                PermissionChanges {
                    description: Some(Some("Reworded".to_string())),
                    target_type: Some(TargetType::OwnerOnly),
                    ..Default::default()
                },
            )
            .await,
        Err(EngineError::Validation(_))
    ));
    let narrowed = h
        .svc
        .update_group_permission(
            &owner,
            &attached.id,
            PermissionChanges {
                target_type: Some(TargetType::OwnerOnly),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(narrowed.target_type, TargetType::OwnerOnly);
    assert!(h
        .svc
        .get_user_permissions(&member.user_id)
        .await
        .unwrap()
        .is_empty());

    h.svc
        .remove_group_permission(&owner, &attached.id)
        .await
        .unwrap();
    assert!(matches!(
        h.svc.remove_group_permission(&owner, &attached.id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn multi_group_merge_keeps_provenance() {
    let h = harness().await;
    let owner_a = pilot();
    let owner_b = pilot();
    let shared = pilot();
    let group_a = h.group_with_members(&owner_a, &[&shared]).await;
    let group_b = h.group_with_members(&owner_b, &[&shared]).await;

    custom(&h, &owner_a, &group_a, "urn:ops:ping", TargetType::AllMembers).await;
    custom(&h, &owner_b, &group_b, "urn:ops:ping", TargetType::AllMembers).await;

    let merged = h
        .svc
        .get_multi_group_member_permissions(&[group_a.id.clone(), group_b.id.clone()])
        .await
        .unwrap();

    assert_eq!(merged.len(), 3);
    let shared_perms = &merged[&shared.user_id];
    assert_eq!(shared_perms.len(), 2);
    assert!(shared_perms.iter().any(|p| p.group_id == group_a.id));
    assert!(shared_perms.iter().any(|p| p.group_id == group_b.id));
    assert_eq!(merged[&owner_a.user_id].len(), 1);
}

#[tokio::test]
async fn registry_is_admin_managed() {
    let h = harness().await;
    let user = pilot();

    assert!(matches!(
        h.svc
            .create_permission(
                &user,
                CreatePermissionParams {
                    urn: "urn:hangar:x".to_string(),
                    name: "X".to_string(),
                    description: None,
                    category_id: None,
                },
            )
            .await,
        Err(EngineError::Forbidden(_))
    ));

    let category = h
        .svc
        .create_permission_category(
            &h.admin,
            CreatePermissionCategoryParams {
                name: "Fleet".to_string(),
                description: Some("Fleet operations".to_string()),
            },
        )
        .await
        .unwrap();
    h.svc
        .create_permission(
            &h.admin,
            CreatePermissionParams {
                urn: "urn:hangar:fleet:command".to_string(),
                name: "Fleet command".to_string(),
                description: None,
                category_id: Some(category.id.clone()),
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        h.svc
            .create_permission(
                &h.admin,
                CreatePermissionParams {
                    urn: "urn:hangar:fleet:command".to_string(),
                    name: "Dup".to_string(),
                    description: None,
                    category_id: None,
                },
            )
            .await,
        Err(EngineError::Conflict(_))
    ));

    assert_eq!(h.svc.list_permission_categories().await.unwrap().len(), 1);
    let perms = h.svc.list_permissions().await.unwrap();
    assert_eq!(perms.len(), 1);
    assert_eq!(perms[0].category_id, Some(category.id));
}
