//! Direct, character-targeted group invitations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{CharacterId, GroupId, InvitationId, ParseEnumError, UserId};

/// Stored invitation status. `Expired` may also be derived at read time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
        }
    }
}

impl FromStr for InvitationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "declined" => Ok(InvitationStatus::Declined),
            "expired" => Ok(InvitationStatus::Expired),
            _ => Err(ParseEnumError::new("invitation status", s)),
        }
    }
}

/// Invitation record
#[derive(Clone, Debug, Serialize)]
pub struct GroupInvitation {
    pub id: InvitationId,
    pub group_id: GroupId,
    pub inviter_id: UserId,
    pub invitee_character_id: CharacterId,
    pub invitee_character_name: String,
    /// Resolved when the character is linked to an account (or at accept time).
    pub invitee_user_id: Option<UserId>,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl GroupInvitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Status as seen at `now`: a pending invitation past its expiry reads as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        match self.status {
            InvitationStatus::Pending if self.is_expired(now) => InvitationStatus::Expired,
            status => status,
        }
    }
}

/// Parameters for creating an invitation
#[derive(Clone, Debug)]
pub struct CreateInvitationParams {
    pub group_id: GroupId,
    pub inviter_id: UserId,
    pub invitee_character_id: CharacterId,
    pub invitee_character_name: String,
    pub invitee_user_id: Option<UserId>,
    pub expires_at: DateTime<Utc>,
}
