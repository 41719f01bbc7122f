#![allow(dead_code)]

use std::sync::Arc;

use hangar_groups::{
    Caller, CharacterRef, EngineConfig, GroupService, MemoryCharacterDirectory, NewGroup,
};
use hangar_storage::{
    Category, CharacterId, CreateCategoryParams, Group, GroupCreationPolicy, JoinMode, UserId,
    Visibility,
};
use hangar_store_sqlite::SqliteStore;
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub svc: Arc<GroupService<SqliteStore>>,
    pub directory: Arc<MemoryCharacterDirectory>,
    pub admin: Caller,
}

pub async fn harness() -> Harness {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let directory = Arc::new(MemoryCharacterDirectory::new());
    let svc = GroupService::new(store.clone(), directory.clone(), EngineConfig::default());
    Harness {
        store,
        svc: Arc::new(svc),
        directory,
        admin: Caller::admin(UserId(Uuid::now_v7())),
    }
}

pub fn pilot() -> Caller {
    Caller::user(UserId(Uuid::now_v7()))
}

impl Harness {
    pub async fn category(&self, name: &str, policy: GroupCreationPolicy) -> Category {
        self.svc
            .create_category(
                &self.admin,
                CreateCategoryParams {
                    name: name.to_string(),
                    description: None,
                    visibility: Visibility::Public,
                    allow_group_creation: policy,
                },
            )
            .await
            .unwrap()
    }

    pub async fn group_in(
        &self,
        category: &Category,
        owner: &Caller,
        name: &str,
        join_mode: JoinMode,
        visibility: Visibility,
    ) -> Group {
        self.svc
            .create_group(
                owner,
                NewGroup {
                    category_id: category.id.clone(),
                    name: name.to_string(),
                    description: None,
                    visibility,
                    join_mode,
                },
            )
            .await
            .unwrap()
    }

    /// Public group in a fresh open category.
    pub async fn group(&self, owner: &Caller, name: &str, join_mode: JoinMode) -> Group {
        let category = self
            .category(&format!("{} category", name), GroupCreationPolicy::Anyone)
            .await;
        self.group_in(&category, owner, name, join_mode, Visibility::Public)
            .await
    }

    /// Uniquely named open group with `members` already joined.
    pub async fn group_with_members(&self, owner: &Caller, members: &[&Caller]) -> Group {
        let name = format!("Fleet {}", Uuid::now_v7().simple());
        let group = self.group(owner, &name, JoinMode::Open).await;
        for member in members {
            self.svc.join_group(member, &group.id).await.unwrap();
        }
        group
    }

    pub fn character(&self, id: i64, name: &str, user: Option<&Caller>) -> CharacterId {
        self.directory.insert(CharacterRef {
            character_id: CharacterId(id),
            character_name: name.to_string(),
            user_id: user.map(|c| c.user_id.clone()),
        });
        CharacterId(id)
    }
}
