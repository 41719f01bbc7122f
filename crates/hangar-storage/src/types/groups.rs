//! Groups, memberships and admin designations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{CategoryId, GroupId, ParseEnumError, UserId, Visibility};

/// How users get into a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    Open,
    Approval,
    InvitationOnly,
}

impl JoinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinMode::Open => "open",
            JoinMode::Approval => "approval",
            JoinMode::InvitationOnly => "invitation_only",
        }
    }
}

impl FromStr for JoinMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(JoinMode::Open),
            "approval" => Ok(JoinMode::Approval),
            "invitation_only" => Ok(JoinMode::InvitationOnly),
            _ => Err(ParseEnumError::new("join mode", s)),
        }
    }
}

/// Group record
#[derive(Clone, Debug, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub join_mode: JoinMode,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Group membership record
#[derive(Clone, Debug, Serialize)]
pub struct GroupMember {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
}

/// Group admin designation record
#[derive(Clone, Debug, Serialize)]
pub struct GroupAdmin {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub designated_at: DateTime<Utc>,
}

/// Parameters for creating a group. The owner is inserted as a member atomically.
#[derive(Clone, Debug)]
pub struct CreateGroupParams {
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub join_mode: JoinMode,
    pub owner_id: UserId,
}

/// Partial update of a group; ownership changes go through transfer instead.
#[derive(Clone, Debug, Default)]
pub struct UpdateGroupParams {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub visibility: Option<Visibility>,
    pub join_mode: Option<JoinMode>,
}

/// Storage-level group listing filter.
#[derive(Clone, Debug, Default)]
pub struct GroupFilter {
    pub category_id: Option<CategoryId>,
    pub visibility: Option<Visibility>,
    /// Case-insensitive substring match on the name.
    pub search: Option<String>,
    /// Only groups this user is a member of.
    pub member_id: Option<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_mode_roundtrip() {
        for mode in [JoinMode::Open, JoinMode::Approval, JoinMode::InvitationOnly] {
            assert_eq!(mode.as_str().parse::<JoinMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_join_mode_parse_invalid() {
        let err = "invite".parse::<JoinMode>().unwrap_err();
        assert!(err.to_string().contains("join mode"));
    }
}
