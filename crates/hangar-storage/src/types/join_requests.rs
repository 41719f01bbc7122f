//! Approval-gated join requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{GroupId, JoinRequestId, ParseEnumError, UserId};

/// Join request status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl JoinRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinRequestStatus::Pending => "pending",
            JoinRequestStatus::Approved => "approved",
            JoinRequestStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for JoinRequestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JoinRequestStatus::Pending),
            "approved" => Ok(JoinRequestStatus::Approved),
            "rejected" => Ok(JoinRequestStatus::Rejected),
            _ => Err(ParseEnumError::new("join request status", s)),
        }
    }
}

/// Join request record
#[derive(Clone, Debug, Serialize)]
pub struct GroupJoinRequest {
    pub id: JoinRequestId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub reason: Option<String>,
    pub status: JoinRequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub responded_by: Option<UserId>,
}

/// Parameters for creating a join request
#[derive(Clone, Debug)]
pub struct CreateJoinRequestParams {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub reason: Option<String>,
}
