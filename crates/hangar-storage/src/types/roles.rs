//! Group roles and permission target audiences.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Error type for parsing one of the storage enums from its string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// A user's standing within one group, computed as owner → admin → member → none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Owner,
    Admin,
    Member,
    None,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Owner => "owner",
            GroupRole::Admin => "admin",
            GroupRole::Member => "member",
            GroupRole::None => "none",
        }
    }

    /// Owner or explicitly designated admin.
    pub fn has_admin_authority(&self) -> bool {
        matches!(self, GroupRole::Owner | GroupRole::Admin)
    }

    pub fn is_member(&self) -> bool {
        !matches!(self, GroupRole::None)
    }
}

impl FromStr for GroupRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(GroupRole::Owner),
            "admin" => Ok(GroupRole::Admin),
            "member" => Ok(GroupRole::Member),
            "none" => Ok(GroupRole::None),
            _ => Err(ParseEnumError::new("group role", s)),
        }
    }
}

/// Audience of a group permission attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    AllMembers,
    AllAdmins,
    OwnerOnly,
    OwnerAndAdmins,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::AllMembers => "all_members",
            TargetType::AllAdmins => "all_admins",
            TargetType::OwnerOnly => "owner_only",
            TargetType::OwnerAndAdmins => "owner_and_admins",
        }
    }

    /// Whether a user holding `role` in the group receives grants with this target.
    pub fn includes(&self, role: GroupRole) -> bool {
        match self {
            TargetType::AllMembers => {
                matches!(role, GroupRole::Owner | GroupRole::Admin | GroupRole::Member)
            }
            TargetType::AllAdmins | TargetType::OwnerAndAdmins => {
                matches!(role, GroupRole::Owner | GroupRole::Admin)
            }
            TargetType::OwnerOnly => matches!(role, GroupRole::Owner),
        }
    }
}

impl FromStr for TargetType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_members" => Ok(TargetType::AllMembers),
            "all_admins" => Ok(TargetType::AllAdmins),
            "owner_only" => Ok(TargetType::OwnerOnly),
            "owner_and_admins" => Ok(TargetType::OwnerAndAdmins),
            _ => Err(ParseEnumError::new("target type", s)),
        }
    }
}
