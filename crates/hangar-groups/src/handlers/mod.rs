//! Operation bodies behind the `GroupService` methods.
//!
//! Each function assumes the caller already holds the appropriate half of the
//! service gate.

pub mod categories;
pub mod groups;
pub mod invitations;
pub mod invite_codes;
pub mod join_requests;
pub mod membership;
pub mod permissions;

use crate::error::EngineError;

pub(crate) const MAX_NAME_LEN: usize = 100;

/// Trimmed, non-empty and at most `MAX_NAME_LEN` characters.
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<String, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::validation(format!("{} name is required", kind)));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(EngineError::validation(format!(
            "{} name must be at most {} characters",
            kind, MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}
