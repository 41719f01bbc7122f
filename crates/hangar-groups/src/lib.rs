//! Group membership and authorization engine.
//!
//! [`GroupService`] is the single entry point: categories, groups, membership,
//! admin designation, invitations, join requests, invite codes and permission
//! resolution, all on top of a [`hangar_storage::Store`] backend.

pub mod config;
mod directory;
mod error;
mod handlers;
mod resolver;
mod service;
mod views;

pub use config::{ConfigError, EngineConfig};
pub use directory::{CharacterDirectory, CharacterRef, DirectoryError, MemoryCharacterDirectory};
pub use error::EngineError;
pub use resolver::{permissions_for_role, resolve_attachment};
pub use service::{Caller, GroupService};
pub use views::*;

#[cfg(test)]
mod tests;
