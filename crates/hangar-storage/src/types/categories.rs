//! Group categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{CategoryId, ParseEnumError};

/// Who may discover a category or group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Hidden,
    /// Reserved for engine-managed groups.
    System,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Hidden => "hidden",
            Visibility::System => "system",
        }
    }
}

impl FromStr for Visibility {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "hidden" => Ok(Visibility::Hidden),
            "system" => Ok(Visibility::System),
            _ => Err(ParseEnumError::new("visibility", s)),
        }
    }
}

/// Who may create groups inside a category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupCreationPolicy {
    Anyone,
    AdminOnly,
}

impl GroupCreationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupCreationPolicy::Anyone => "anyone",
            GroupCreationPolicy::AdminOnly => "admin_only",
        }
    }
}

impl FromStr for GroupCreationPolicy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anyone" => Ok(GroupCreationPolicy::Anyone),
            "admin_only" => Ok(GroupCreationPolicy::AdminOnly),
            _ => Err(ParseEnumError::new("group creation policy", s)),
        }
    }
}

/// Category record
#[derive(Clone, Debug, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub allow_group_creation: GroupCreationPolicy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a category
#[derive(Clone, Debug)]
pub struct CreateCategoryParams {
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub allow_group_creation: GroupCreationPolicy,
}

/// Partial update of a category; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct UpdateCategoryParams {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub visibility: Option<Visibility>,
    pub allow_group_creation: Option<GroupCreationPolicy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_roundtrip() {
        for v in [Visibility::Public, Visibility::Hidden, Visibility::System] {
            assert_eq!(v.as_str().parse::<Visibility>().unwrap(), v);
        }
        assert!("secret".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_creation_policy_parse() {
        assert_eq!(
            "admin_only".parse::<GroupCreationPolicy>().unwrap(),
            GroupCreationPolicy::AdminOnly
        );
        assert!("admins".parse::<GroupCreationPolicy>().is_err());
    }
}
