//! Shareable, usage- and time-limited invite codes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{GroupId, InviteCodeId, RedemptionId, UserId};

/// Invite code record
#[derive(Clone, Debug, Serialize)]
pub struct GroupInviteCode {
    pub id: InviteCodeId,
    pub group_id: GroupId,
    pub code: String,
    pub created_by: UserId,
    /// `None` means unlimited.
    pub max_uses: Option<u32>,
    pub current_uses: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl GroupInviteCode {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses
            .map(|max| self.current_uses >= max)
            .unwrap_or(false)
    }

    /// Uses left before exhaustion, `None` when unlimited.
    pub fn remaining_uses(&self) -> Option<u32> {
        self.max_uses
            .map(|max| max.saturating_sub(self.current_uses))
    }
}

/// Append-only audit row for one redemption.
#[derive(Clone, Debug, Serialize)]
pub struct InviteCodeRedemption {
    pub id: RedemptionId,
    pub invite_code_id: InviteCodeId,
    pub user_id: UserId,
    pub redeemed_at: DateTime<Utc>,
}

/// Parameters for creating an invite code
#[derive(Clone, Debug)]
pub struct CreateInviteCodeParams {
    pub group_id: GroupId,
    pub code: String,
    pub created_by: UserId,
    pub max_uses: Option<u32>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn code(max_uses: Option<u32>, current_uses: u32) -> GroupInviteCode {
        GroupInviteCode {
            id: InviteCodeId(Uuid::new_v4()),
            group_id: GroupId(Uuid::new_v4()),
            code: "abc".to_string(),
            created_by: UserId(Uuid::new_v4()),
            max_uses,
            current_uses,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(7),
            revoked_at: None,
        }
    }

    #[test]
    fn test_unlimited_code_never_exhausts() {
        let c = code(None, 10_000);
        assert!(!c.is_exhausted());
        assert_eq!(c.remaining_uses(), None);
    }

    #[test]
    fn test_exhaustion_at_max_uses() {
        assert!(!code(Some(3), 2).is_exhausted());
        assert!(code(Some(3), 3).is_exhausted());
        assert_eq!(code(Some(3), 1).remaining_uses(), Some(2));
    }

    #[test]
    fn test_expiry_boundary() {
        let c = code(Some(1), 0);
        assert!(!c.is_expired(c.expires_at - Duration::seconds(1)));
        assert!(c.is_expired(c.expires_at));
    }
}
