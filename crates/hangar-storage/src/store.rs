//! The Store trait that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// The storage trait `hangar-groups` depends on.
///
/// Methods that write more than one row (group creation, ownership transfer,
/// member removal, invitation acceptance, join request disposition, invite code
/// redemption, cascading deletes) must be atomic: either every row is written or
/// none is.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Categories ─────────────────────────────────────

    /// Create a category.
    async fn create_category(&self, params: &CreateCategoryParams)
        -> Result<Category, StoreError>;

    /// Get category by ID.
    async fn get_category(&self, category_id: &CategoryId) -> Result<Category, StoreError>;

    /// List all categories ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Apply a partial update and return the new record.
    async fn update_category(
        &self,
        category_id: &CategoryId,
        params: &UpdateCategoryParams,
    ) -> Result<Category, StoreError>;

    /// Delete a category. Fails with `Conflict` while it still holds groups,
    /// unless `cascade` is set, in which case its groups are deleted as well.
    async fn delete_category(&self, category_id: &CategoryId, cascade: bool)
        -> Result<(), StoreError>;

    // ─────────────────────────────────────── Groups ───────────────────────────────────────

    /// Create a group and insert its owner as the first member.
    async fn create_group(&self, params: &CreateGroupParams) -> Result<Group, StoreError>;

    /// Get group by ID.
    async fn get_group(&self, group_id: &GroupId) -> Result<Group, StoreError>;

    /// List groups matching the filter, ordered by name.
    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>, StoreError>;

    /// Apply a partial update and return the new record.
    async fn update_group(
        &self,
        group_id: &GroupId,
        params: &UpdateGroupParams,
    ) -> Result<Group, StoreError>;

    /// Delete a group together with its members, admins, invitations, invite codes,
    /// redemptions, join requests and permission attachments.
    async fn delete_group(&self, group_id: &GroupId) -> Result<(), StoreError>;

    /// Hand ownership to `new_owner_id` and keep the previous owner as an admin.
    async fn transfer_group_ownership(
        &self,
        group_id: &GroupId,
        new_owner_id: &UserId,
    ) -> Result<Group, StoreError>;

    // ────────────────────────────────────── Members ───────────────────────────────────────

    /// Add a member (`AlreadyExists` on duplicates).
    async fn add_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<GroupMember, StoreError>;

    /// Remove a member together with their admin designation and pending join request.
    async fn remove_group_member(&self, group_id: &GroupId, user_id: &UserId)
        -> Result<(), StoreError>;

    /// Get a single membership row.
    async fn get_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<GroupMember, StoreError>;

    /// List members of a group, oldest first.
    async fn list_group_members(&self, group_id: &GroupId)
        -> Result<Vec<GroupMember>, StoreError>;

    /// List memberships of a user.
    async fn list_user_memberships(&self, user_id: &UserId)
        -> Result<Vec<GroupMember>, StoreError>;

    // ─────────────────────────────────────── Admins ───────────────────────────────────────

    /// Designate an admin (`AlreadyExists` on duplicates).
    async fn add_group_admin(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<GroupAdmin, StoreError>;

    /// Remove an admin designation.
    async fn remove_group_admin(&self, group_id: &GroupId, user_id: &UserId)
        -> Result<(), StoreError>;

    /// Whether an explicit admin row exists.
    async fn is_group_admin(&self, group_id: &GroupId, user_id: &UserId)
        -> Result<bool, StoreError>;

    /// List admin designations of a group.
    async fn list_group_admins(&self, group_id: &GroupId) -> Result<Vec<GroupAdmin>, StoreError>;

    // ──────────────────────────────────── Invitations ─────────────────────────────────────

    /// Record an invitation.
    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<GroupInvitation, StoreError>;

    /// Get invitation by ID.
    async fn get_invitation(&self, invitation_id: &InvitationId)
        -> Result<GroupInvitation, StoreError>;

    /// List every invitation of a group, newest first.
    async fn list_group_invitations(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<GroupInvitation>, StoreError>;

    /// List pending invitations addressed to a user or any of their characters.
    async fn list_pending_invitations_for(
        &self,
        user_id: &UserId,
        character_ids: &[CharacterId],
    ) -> Result<Vec<GroupInvitation>, StoreError>;

    /// Find the pending invitation of a character to a group, if any.
    async fn find_pending_invitation(
        &self,
        group_id: &GroupId,
        character_id: &CharacterId,
    ) -> Result<Option<GroupInvitation>, StoreError>;

    /// Mark a pending invitation accepted by `user_id` and add them as a member.
    /// `Conflict` if the invitation is no longer pending.
    async fn accept_invitation(
        &self,
        invitation_id: &InvitationId,
        user_id: &UserId,
    ) -> Result<GroupInvitation, StoreError>;

    /// Move a pending invitation to a terminal status. `Conflict` if no longer pending.
    async fn close_invitation(
        &self,
        invitation_id: &InvitationId,
        status: InvitationStatus,
    ) -> Result<GroupInvitation, StoreError>;

    // ─────────────────────────────────── Join Requests ────────────────────────────────────

    /// Record a join request (`AlreadyExists` if one is already pending).
    async fn create_join_request(
        &self,
        params: &CreateJoinRequestParams,
    ) -> Result<GroupJoinRequest, StoreError>;

    /// Get join request by ID.
    async fn get_join_request(
        &self,
        request_id: &JoinRequestId,
    ) -> Result<GroupJoinRequest, StoreError>;

    /// List join requests of a group, optionally filtered by status, oldest first.
    async fn list_join_requests(
        &self,
        group_id: &GroupId,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<GroupJoinRequest>, StoreError>;

    /// List join requests made by a user, newest first.
    async fn list_user_join_requests(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<GroupJoinRequest>, StoreError>;

    /// Approve or reject a pending request; approval also adds the member.
    /// `Conflict` if the request is no longer pending.
    async fn respond_join_request(
        &self,
        request_id: &JoinRequestId,
        status: JoinRequestStatus,
        responded_by: &UserId,
    ) -> Result<GroupJoinRequest, StoreError>;

    /// Delete a pending join request. `Conflict` if it is no longer pending.
    async fn delete_join_request(&self, request_id: &JoinRequestId) -> Result<(), StoreError>;

    // ──────────────────────────────────── Invite Codes ────────────────────────────────────

    /// Store a generated invite code (`AlreadyExists` on code collision).
    async fn create_invite_code(
        &self,
        params: &CreateInviteCodeParams,
    ) -> Result<GroupInviteCode, StoreError>;

    /// Get invite code by ID.
    async fn get_invite_code(&self, code_id: &InviteCodeId)
        -> Result<GroupInviteCode, StoreError>;

    /// Get invite code by its shareable code.
    async fn get_invite_code_by_code(&self, code: &str) -> Result<GroupInviteCode, StoreError>;

    /// List invite codes of a group, newest first.
    async fn list_invite_codes(&self, group_id: &GroupId)
        -> Result<Vec<GroupInviteCode>, StoreError>;

    /// Mark a code revoked. `Conflict` if it already was.
    async fn revoke_invite_code(
        &self,
        code_id: &InviteCodeId,
        revoked_at: DateTime<Utc>,
    ) -> Result<GroupInviteCode, StoreError>;

    /// Consume one use, append the redemption row and add the member, all or nothing.
    ///
    /// The use counter only moves while the code is unrevoked, unexpired at `now`
    /// and below `max_uses`; otherwise `Conflict`. `AlreadyExists` if the user is
    /// already a member.
    async fn redeem_invite_code(
        &self,
        code_id: &InviteCodeId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<InviteCodeRedemption, StoreError>;

    /// List redemptions of a code, oldest first.
    async fn list_invite_code_redemptions(
        &self,
        code_id: &InviteCodeId,
    ) -> Result<Vec<InviteCodeRedemption>, StoreError>;

    // ──────────────────────────────────── Permissions ─────────────────────────────────────

    /// Create a permission category.
    async fn create_permission_category(
        &self,
        params: &CreatePermissionCategoryParams,
    ) -> Result<PermissionCategory, StoreError>;

    /// List permission categories ordered by name.
    async fn list_permission_categories(&self) -> Result<Vec<PermissionCategory>, StoreError>;

    /// Register a global permission (`AlreadyExists` on duplicate URN).
    async fn create_permission(
        &self,
        params: &CreatePermissionParams,
    ) -> Result<Permission, StoreError>;

    /// Get global permission by ID.
    async fn get_permission(&self, permission_id: &PermissionId)
        -> Result<Permission, StoreError>;

    /// List global permissions ordered by URN.
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError>;

    /// Attach a permission to a group (`AlreadyExists` if the same global
    /// permission or custom URN is already attached).
    async fn create_group_permission(
        &self,
        params: &CreateGroupPermissionParams,
    ) -> Result<GroupPermission, StoreError>;

    /// Get attachment by ID.
    async fn get_group_permission(
        &self,
        group_permission_id: &GroupPermissionId,
    ) -> Result<GroupPermission, StoreError>;

    /// Replace the grant and target of an attachment.
    async fn update_group_permission(
        &self,
        group_permission_id: &GroupPermissionId,
        params: &UpdateGroupPermissionParams,
    ) -> Result<GroupPermission, StoreError>;

    /// Remove an attachment.
    async fn delete_group_permission(
        &self,
        group_permission_id: &GroupPermissionId,
    ) -> Result<(), StoreError>;

    /// List attachments of a group, oldest first.
    async fn list_group_permissions(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<GroupPermission>, StoreError>;
}
