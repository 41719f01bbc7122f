//! Character lookup collaborator.
//!
//! Invitations address EVE characters by name. The engine never owns the
//! character/account mapping; it asks a [`CharacterDirectory`] instead.

use dashmap::DashMap;
use hangar_storage::{CharacterId, UserId};
use thiserror::Error;

/// A resolved character and the account it is linked to, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterRef {
    pub character_id: CharacterId,
    pub character_name: String,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CharacterDirectory: Send + Sync {
    /// Look a character up by exact name (case-insensitive).
    async fn resolve_character(&self, name: &str) -> Result<Option<CharacterRef>, DirectoryError>;

    /// All characters linked to a user account.
    async fn characters_for_user(&self, user_id: &UserId)
        -> Result<Vec<CharacterId>, DirectoryError>;
}

/// In-memory directory for tests and local tooling.
#[derive(Default)]
pub struct MemoryCharacterDirectory {
    by_name: DashMap<String, CharacterRef>,
}

impl MemoryCharacterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, character: CharacterRef) {
        self.by_name
            .insert(character.character_name.to_lowercase(), character);
    }

    /// Link an already known character to a user. Returns false for unknown characters.
    pub fn link(&self, character_id: CharacterId, user_id: UserId) -> bool {
        match self
            .by_name
            .iter_mut()
            .find(|entry| entry.character_id == character_id)
        {
            Some(mut entry) => {
                entry.user_id = Some(user_id);
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl CharacterDirectory for MemoryCharacterDirectory {
    async fn resolve_character(&self, name: &str) -> Result<Option<CharacterRef>, DirectoryError> {
        Ok(self
            .by_name
            .get(&name.trim().to_lowercase())
            .map(|entry| entry.value().clone()))
    }

    async fn characters_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<CharacterId>, DirectoryError> {
        let mut ids: Vec<CharacterId> = self
            .by_name
            .iter()
            .filter(|entry| entry.user_id.as_ref() == Some(user_id))
            .map(|entry| entry.character_id)
            .collect();
        ids.sort_by_key(|id| id.0);
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_resolve_is_case_insensitive() {
        let dir = MemoryCharacterDirectory::new();
        dir.insert(CharacterRef {
            character_id: CharacterId(90000001),
            character_name: "Chribba".to_string(),
            user_id: None,
        });

        let found = dir.resolve_character("  chribba ").await.unwrap().unwrap();
        assert_eq!(found.character_id, CharacterId(90000001));
        assert!(dir.resolve_character("Mynxee").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_link_and_list_characters() {
        let dir = MemoryCharacterDirectory::new();
        let user = UserId(Uuid::now_v7());
        for (id, name) in [(3, "Alt Three"), (1, "Main"), (2, "Alt Two")] {
            dir.insert(CharacterRef {
                character_id: CharacterId(id),
                character_name: name.to_string(),
                user_id: None,
            });
        }

        assert!(dir.link(CharacterId(1), user.clone()));
        assert!(dir.link(CharacterId(3), user.clone()));
        assert!(!dir.link(CharacterId(99), user.clone()));

        let ids = dir.characters_for_user(&user).await.unwrap();
        assert_eq!(ids, vec![CharacterId(1), CharacterId(3)]);
    }
}
