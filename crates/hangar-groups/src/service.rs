use std::collections::BTreeMap;
use std::sync::Arc;

use hangar_storage::*;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::EngineConfig;
use crate::directory::CharacterDirectory;
use crate::error::{missing, EngineError};
use crate::handlers;
use crate::views::*;

/// The authenticated identity behind a call, as asserted by the identity layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    /// Global administrator flag.
    pub is_admin: bool,
}

impl Caller {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }
}

/// Group membership and authorization engine.
///
/// Mutations hold the write half of `gate` for their whole duration and reads
/// hold the read half, so a read never observes a half-applied mutation.
pub struct GroupService<S: Store> {
    pub(crate) store: Arc<S>,
    pub(crate) directory: Arc<dyn CharacterDirectory>,
    pub(crate) config: EngineConfig,
    gate: RwLock<()>,
}

impl<S: Store> GroupService<S> {
    pub fn new(store: Arc<S>, directory: Arc<dyn CharacterDirectory>, config: EngineConfig) -> Self {
        Self {
            store,
            directory,
            config,
            gate: RwLock::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) async fn load_group(&self, group_id: &GroupId) -> Result<Group, EngineError> {
        self.store
            .get_group(group_id)
            .await
            .map_err(missing("group"))
    }

    /// Role of `user_id` in `group`: owner, then explicit admin, then member.
    pub(crate) async fn role_of(
        &self,
        group: &Group,
        user_id: &UserId,
    ) -> Result<GroupRole, EngineError> {
        if group.owner_id == *user_id {
            return Ok(GroupRole::Owner);
        }
        if self.store.is_group_admin(&group.id, user_id).await? {
            return Ok(GroupRole::Admin);
        }
        match self.store.get_group_member(&group.id, user_id).await {
            Ok(_) => Ok(GroupRole::Member),
            Err(StoreError::NotFound) => Ok(GroupRole::None),
            Err(e) => Err(e.into()),
        }
    }

    /// Caller's role, or `NotFound` when the group is invisible to the caller.
    pub(crate) async fn visible_role(
        &self,
        group: &Group,
        caller: &Caller,
    ) -> Result<GroupRole, EngineError> {
        let role = self.role_of(group, &caller.user_id).await?;
        if can_see(group, caller, role) {
            Ok(role)
        } else {
            Err(EngineError::NotFound("group"))
        }
    }

    /// Owner or group admin.
    pub(crate) async fn require_authority(
        &self,
        group: &Group,
        caller: &Caller,
        action: &str,
    ) -> Result<GroupRole, EngineError> {
        let role = self.role_of(group, &caller.user_id).await?;
        if role.has_admin_authority() {
            return Ok(role);
        }
        warn!(group_id = %group.id.0, user_id = %caller.user_id.0, action, "denied: not a group admin");
        Err(EngineError::forbidden(format!(
            "only the owner or a group admin may {}",
            action
        )))
    }

    pub(crate) fn require_owner(
        &self,
        group: &Group,
        caller: &Caller,
        action: &str,
    ) -> Result<(), EngineError> {
        if group.owner_id == caller.user_id {
            return Ok(());
        }
        warn!(group_id = %group.id.0, user_id = %caller.user_id.0, action, "denied: not the owner");
        Err(EngineError::forbidden(format!(
            "only the group owner may {}",
            action
        )))
    }

    /// Owner, or a global administrator acting on the owner's behalf.
    pub(crate) fn require_owner_or_global_admin(
        &self,
        group: &Group,
        caller: &Caller,
        action: &str,
    ) -> Result<(), EngineError> {
        if caller.is_admin {
            return Ok(());
        }
        self.require_owner(group, caller, action)
    }

    pub(crate) fn require_global_admin(
        &self,
        caller: &Caller,
        action: &str,
    ) -> Result<(), EngineError> {
        if caller.is_admin {
            return Ok(());
        }
        warn!(user_id = %caller.user_id.0, action, "denied: not a global admin");
        Err(EngineError::forbidden(format!(
            "only administrators may {}",
            action
        )))
    }

    // ───────────────────────────── Categories ─────────────────────────────

    pub async fn create_category(
        &self,
        caller: &Caller,
        params: CreateCategoryParams,
    ) -> Result<Category, EngineError> {
        let _gate = self.gate.write().await;
        handlers::categories::create_category(self, caller, params).await
    }

    pub async fn list_categories(&self, caller: &Caller) -> Result<Vec<Category>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::categories::list_categories(self, caller).await
    }

    pub async fn get_category(
        &self,
        caller: &Caller,
        category_id: &CategoryId,
    ) -> Result<Category, EngineError> {
        let _gate = self.gate.read().await;
        handlers::categories::get_category(self, caller, category_id).await
    }

    pub async fn update_category(
        &self,
        caller: &Caller,
        category_id: &CategoryId,
        params: UpdateCategoryParams,
    ) -> Result<Category, EngineError> {
        let _gate = self.gate.write().await;
        handlers::categories::update_category(self, caller, category_id, params).await
    }

    pub async fn delete_category(
        &self,
        caller: &Caller,
        category_id: &CategoryId,
        cascade: bool,
    ) -> Result<(), EngineError> {
        let _gate = self.gate.write().await;
        handlers::categories::delete_category(self, caller, category_id, cascade).await
    }

    // ───────────────────────────── Groups ─────────────────────────────

    pub async fn create_group(&self, caller: &Caller, new: NewGroup) -> Result<Group, EngineError> {
        let _gate = self.gate.write().await;
        handlers::groups::create_group(self, caller, new).await
    }

    pub async fn list_groups(
        &self,
        caller: &Caller,
        filter: GroupFilter,
    ) -> Result<Vec<Group>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::groups::list_groups(self, caller, filter).await
    }

    pub async fn get_group(
        &self,
        caller: &Caller,
        group_id: &GroupId,
    ) -> Result<GroupDetails, EngineError> {
        let _gate = self.gate.read().await;
        handlers::groups::get_group(self, caller, group_id).await
    }

    pub async fn update_group(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        params: UpdateGroupParams,
    ) -> Result<Group, EngineError> {
        let _gate = self.gate.write().await;
        handlers::groups::update_group(self, caller, group_id, params).await
    }

    pub async fn delete_group(&self, caller: &Caller, group_id: &GroupId) -> Result<(), EngineError> {
        let _gate = self.gate.write().await;
        handlers::groups::delete_group(self, caller, group_id).await
    }

    pub async fn transfer_ownership(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        new_owner_id: &UserId,
    ) -> Result<Group, EngineError> {
        let _gate = self.gate.write().await;
        handlers::groups::transfer_ownership(self, caller, group_id, new_owner_id).await
    }

    // ───────────────────────────── Membership ─────────────────────────────

    pub async fn join_group(
        &self,
        caller: &Caller,
        group_id: &GroupId,
    ) -> Result<GroupMember, EngineError> {
        let _gate = self.gate.write().await;
        handlers::membership::join_group(self, caller, group_id).await
    }

    pub async fn leave_group(&self, caller: &Caller, group_id: &GroupId) -> Result<(), EngineError> {
        let _gate = self.gate.write().await;
        handlers::membership::leave_group(self, caller, group_id).await
    }

    pub async fn remove_member(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), EngineError> {
        let _gate = self.gate.write().await;
        handlers::membership::remove_member(self, caller, group_id, user_id).await
    }

    pub async fn get_group_members(
        &self,
        caller: &Caller,
        group_id: &GroupId,
    ) -> Result<Vec<MemberView>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::membership::get_group_members(self, caller, group_id).await
    }

    pub async fn get_user_memberships(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<MembershipView>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::membership::get_user_memberships(self, user_id).await
    }

    // ───────────────────────────── Admins ─────────────────────────────

    pub async fn add_admin(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), EngineError> {
        let _gate = self.gate.write().await;
        handlers::membership::add_admin(self, caller, group_id, user_id).await
    }

    pub async fn remove_admin(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), EngineError> {
        let _gate = self.gate.write().await;
        handlers::membership::remove_admin(self, caller, group_id, user_id).await
    }

    pub async fn is_group_admin(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<bool, EngineError> {
        let _gate = self.gate.read().await;
        handlers::membership::is_group_admin(self, group_id, user_id).await
    }

    // ───────────────────────────── Join Requests ─────────────────────────────

    pub async fn create_join_request(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        reason: Option<String>,
    ) -> Result<GroupJoinRequest, EngineError> {
        let _gate = self.gate.write().await;
        handlers::join_requests::create_join_request(self, caller, group_id, reason).await
    }

    pub async fn list_join_requests(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<GroupJoinRequest>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::join_requests::list_join_requests(self, caller, group_id, status).await
    }

    pub async fn list_user_join_requests(
        &self,
        caller: &Caller,
    ) -> Result<Vec<GroupJoinRequest>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::join_requests::list_user_join_requests(self, caller).await
    }

    pub async fn approve_join_request(
        &self,
        caller: &Caller,
        request_id: &JoinRequestId,
    ) -> Result<GroupJoinRequest, EngineError> {
        let _gate = self.gate.write().await;
        handlers::join_requests::respond_join_request(
            self,
            caller,
            request_id,
            JoinRequestStatus::Approved,
        )
        .await
    }

    pub async fn reject_join_request(
        &self,
        caller: &Caller,
        request_id: &JoinRequestId,
    ) -> Result<GroupJoinRequest, EngineError> {
        let _gate = self.gate.write().await;
        handlers::join_requests::respond_join_request(
            self,
            caller,
            request_id,
            JoinRequestStatus::Rejected,
        )
        .await
    }

    pub async fn cancel_join_request(
        &self,
        caller: &Caller,
        request_id: &JoinRequestId,
    ) -> Result<(), EngineError> {
        let _gate = self.gate.write().await;
        handlers::join_requests::cancel_join_request(self, caller, request_id).await
    }

    // ───────────────────────────── Invitations ─────────────────────────────

    pub async fn create_invitation(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        character_name: &str,
    ) -> Result<GroupInvitation, EngineError> {
        // Directory lookups can be slow; resolve before taking the gate.
        let character = self.directory.resolve_character(character_name).await?;
        let _gate = self.gate.write().await;
        handlers::invitations::create_invitation(self, caller, group_id, character).await
    }

    pub async fn list_pending_invitations(
        &self,
        caller: &Caller,
    ) -> Result<Vec<GroupInvitation>, EngineError> {
        let characters = self.directory.characters_for_user(&caller.user_id).await?;
        let _gate = self.gate.read().await;
        handlers::invitations::list_pending_invitations(self, caller, &characters).await
    }

    pub async fn get_group_invitations(
        &self,
        caller: &Caller,
        group_id: &GroupId,
    ) -> Result<Vec<GroupInvitation>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::invitations::get_group_invitations(self, caller, group_id).await
    }

    pub async fn accept_invitation(
        &self,
        caller: &Caller,
        invitation_id: &InvitationId,
    ) -> Result<GroupInvitation, EngineError> {
        let characters = self.directory.characters_for_user(&caller.user_id).await?;
        let _gate = self.gate.write().await;
        handlers::invitations::accept_invitation(self, caller, invitation_id, &characters).await
    }

    pub async fn decline_invitation(
        &self,
        caller: &Caller,
        invitation_id: &InvitationId,
    ) -> Result<GroupInvitation, EngineError> {
        let characters = self.directory.characters_for_user(&caller.user_id).await?;
        let _gate = self.gate.write().await;
        handlers::invitations::decline_invitation(self, caller, invitation_id, &characters).await
    }

    // ───────────────────────────── Invite Codes ─────────────────────────────

    pub async fn create_invite_code(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        max_uses: Option<u32>,
        expires_in_days: u32,
    ) -> Result<GroupInviteCode, EngineError> {
        let _gate = self.gate.write().await;
        handlers::invite_codes::create_invite_code(self, caller, group_id, max_uses, expires_in_days)
            .await
    }

    pub async fn list_invite_codes(
        &self,
        caller: &Caller,
        group_id: &GroupId,
    ) -> Result<Vec<GroupInviteCode>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::invite_codes::list_invite_codes(self, caller, group_id).await
    }

    pub async fn revoke_invite_code(
        &self,
        caller: &Caller,
        code_id: &InviteCodeId,
    ) -> Result<GroupInviteCode, EngineError> {
        let _gate = self.gate.write().await;
        handlers::invite_codes::revoke_invite_code(self, caller, code_id).await
    }

    pub async fn redeem_invite_code(
        &self,
        caller: &Caller,
        code: &str,
    ) -> Result<InviteCodeRedemption, EngineError> {
        let _gate = self.gate.write().await;
        handlers::invite_codes::redeem_invite_code(self, caller, code).await
    }

    pub async fn list_invite_code_redemptions(
        &self,
        caller: &Caller,
        code_id: &InviteCodeId,
    ) -> Result<Vec<InviteCodeRedemption>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::invite_codes::list_invite_code_redemptions(self, caller, code_id).await
    }

    // ───────────────────────────── Permissions ─────────────────────────────

    pub async fn attach_permission(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        permission_id: &PermissionId,
        target_type: TargetType,
    ) -> Result<GroupPermission, EngineError> {
        let _gate = self.gate.write().await;
        handlers::permissions::attach_permission(self, caller, group_id, permission_id, target_type)
            .await
    }

    pub async fn create_group_scoped_permission(
        &self,
        caller: &Caller,
        group_id: &GroupId,
        permission: CustomPermission,
        target_type: TargetType,
    ) -> Result<GroupPermission, EngineError> {
        let _gate = self.gate.write().await;
        handlers::permissions::create_group_scoped_permission(
            self,
            caller,
            group_id,
            permission,
            target_type,
        )
        .await
    }

    pub async fn update_group_permission(
        &self,
        caller: &Caller,
        group_permission_id: &GroupPermissionId,
        changes: PermissionChanges,
    ) -> Result<GroupPermission, EngineError> {
        let _gate = self.gate.write().await;
        handlers::permissions::update_group_permission(self, caller, group_permission_id, changes)
            .await
    }

    pub async fn remove_group_permission(
        &self,
        caller: &Caller,
        group_permission_id: &GroupPermissionId,
    ) -> Result<(), EngineError> {
        let _gate = self.gate.write().await;
        handlers::permissions::remove_group_permission(self, caller, group_permission_id).await
    }

    pub async fn get_group_permissions(
        &self,
        caller: &Caller,
        group_id: &GroupId,
    ) -> Result<Vec<ResolvedPermission>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::permissions::get_group_permissions(self, caller, group_id).await
    }

    pub async fn get_group_member_permissions(
        &self,
        caller: &Caller,
        group_id: &GroupId,
    ) -> Result<Vec<MemberPermissions>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::permissions::get_group_member_permissions(self, caller, group_id).await
    }

    pub async fn get_user_permissions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ResolvedPermission>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::permissions::get_user_permissions(self, user_id).await
    }

    pub async fn get_multi_group_member_permissions(
        &self,
        group_ids: &[GroupId],
    ) -> Result<BTreeMap<UserId, Vec<ResolvedPermission>>, EngineError> {
        let _gate = self.gate.read().await;
        handlers::permissions::get_multi_group_member_permissions(self, group_ids).await
    }

    pub async fn create_permission_category(
        &self,
        caller: &Caller,
        params: CreatePermissionCategoryParams,
    ) -> Result<PermissionCategory, EngineError> {
        let _gate = self.gate.write().await;
        handlers::permissions::create_permission_category(self, caller, params).await
    }

    pub async fn list_permission_categories(&self) -> Result<Vec<PermissionCategory>, EngineError> {
        let _gate = self.gate.read().await;
        Ok(self.store.list_permission_categories().await?)
    }

    pub async fn create_permission(
        &self,
        caller: &Caller,
        params: CreatePermissionParams,
    ) -> Result<Permission, EngineError> {
        let _gate = self.gate.write().await;
        handlers::permissions::create_permission(self, caller, params).await
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, EngineError> {
        let _gate = self.gate.read().await;
        Ok(self.store.list_permissions().await?)
    }
}

/// Hidden groups are visible to their members and global admins; system
/// groups to global admins only.
pub(crate) fn can_see(group: &Group, caller: &Caller, role: GroupRole) -> bool {
    match group.visibility {
        Visibility::Public => true,
        Visibility::Hidden => caller.is_admin || role.is_member(),
        Visibility::System => caller.is_admin,
    }
}
