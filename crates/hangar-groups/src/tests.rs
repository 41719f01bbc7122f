//! Collaborator failure paths, driven through mocks.

use std::sync::Arc;

use chrono::Utc;
use hangar_storage::{
    CategoryId, Group, GroupId, JoinMode, MockStore, StoreError, UserId, Visibility,
};
use uuid::Uuid;

use crate::directory::{DirectoryError, MockCharacterDirectory};
use crate::{Caller, EngineConfig, EngineError, GroupService};

fn group_owned_by(owner: &UserId) -> Group {
    Group {
        id: GroupId(Uuid::now_v7()),
        category_id: CategoryId(Uuid::now_v7()),
        name: "Tackle Wing".to_string(),
        description: None,
        visibility: Visibility::Public,
        join_mode: JoinMode::InvitationOnly,
        owner_id: owner.clone(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn service(store: MockStore, directory: MockCharacterDirectory) -> GroupService<MockStore> {
    GroupService::new(Arc::new(store), Arc::new(directory), EngineConfig::default())
}

#[tokio::test]
async fn directory_outage_fails_invitation_without_writing() {
    let owner = Caller::user(UserId(Uuid::now_v7()));
    let group = group_owned_by(&owner.user_id);
    let group_id = group.id.clone();

    let mut store = MockStore::new();
    store
        .expect_get_group()
        .returning(move |_| Ok(group.clone()));
    store.expect_create_invitation().never();

    let mut directory = MockCharacterDirectory::new();
    directory
        .expect_resolve_character()
        .times(1)
        .returning(|_| Err(DirectoryError::Unavailable("ESI timeout".to_string())));

    let svc = service(store, directory);
    let err = svc
        .create_invitation(&owner, &group_id, "Some Pilot")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Directory(_)));
}

#[tokio::test]
async fn directory_outage_fails_pending_listing() {
    let user = Caller::user(UserId(Uuid::now_v7()));

    let mut store = MockStore::new();
    store.expect_list_pending_invitations_for().never();

    let mut directory = MockCharacterDirectory::new();
    directory
        .expect_characters_for_user()
        .returning(|_| Err(DirectoryError::Unavailable("connection reset".to_string())));

    let svc = service(store, directory);
    assert!(matches!(
        svc.list_pending_invitations(&user).await,
        Err(EngineError::Directory(_))
    ));
}

#[tokio::test]
async fn forbidden_delete_never_reaches_the_store() {
    let owner = UserId(Uuid::now_v7());
    let intruder = Caller::user(UserId(Uuid::now_v7()));
    let group = group_owned_by(&owner);
    let group_id = group.id.clone();

    let mut store = MockStore::new();
    store
        .expect_get_group()
        .returning(move |_| Ok(group.clone()));
    store.expect_delete_group().never();

    let svc = service(store, MockCharacterDirectory::new());
    assert!(matches!(
        svc.delete_group(&intruder, &group_id).await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn backend_failure_is_reported_as_store_error() {
    let caller = Caller::user(UserId(Uuid::now_v7()));

    let mut store = MockStore::new();
    store
        .expect_get_group()
        .returning(|_| Err(StoreError::Backend("database is locked".to_string())));

    let svc = service(store, MockCharacterDirectory::new());
    let err = svc
        .get_group(&caller, &GroupId(Uuid::now_v7()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(StoreError::Backend(_))));
    assert!(err.to_string().contains("database is locked"));
}
