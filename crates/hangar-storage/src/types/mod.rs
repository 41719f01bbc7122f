//! Type definitions for hangar storage.

mod categories;
mod groups;
mod ids;
mod invitations;
mod invite_codes;
mod join_requests;
mod permissions;
mod roles;

// Re-export all types from submodules
pub use categories::*;
pub use groups::*;
pub use ids::*;
pub use invitations::*;
pub use invite_codes::*;
pub use join_requests::*;
pub use permissions::*;
pub use roles::*;
