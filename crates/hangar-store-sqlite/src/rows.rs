//! Raw SQLite rows and their conversion into storage records.

use chrono::{DateTime, Utc};
use hangar_storage::*;
use std::str::FromStr;
use uuid::Uuid;

pub(crate) fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn timestamp(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Backend(format!("invalid timestamp: {}", ms)))
}

fn opt_timestamp(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StoreError> {
    ms.map(timestamp).transpose()
}

fn uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn opt_uuid(s: Option<&str>) -> Result<Option<Uuid>, StoreError> {
    s.map(uuid).transpose()
}

fn parse<T>(s: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    s.parse::<T>().map_err(|e| StoreError::Backend(e.to_string()))
}

fn count(n: i64) -> Result<u32, StoreError> {
    u32::try_from(n).map_err(|e| StoreError::Backend(e.to_string()))
}

#[derive(sqlx::FromRow)]
pub(crate) struct CategoryRow {
    id: String,
    name: String,
    description: Option<String>,
    visibility: String,
    allow_group_creation: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<CategoryRow> for Category {
    type Error = StoreError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Category {
            id: CategoryId(uuid(&row.id)?),
            name: row.name,
            description: row.description,
            visibility: parse(&row.visibility)?,
            allow_group_creation: parse(&row.allow_group_creation)?,
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct GroupRow {
    id: String,
    category_id: String,
    name: String,
    description: Option<String>,
    visibility: String,
    join_mode: String,
    owner_id: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<GroupRow> for Group {
    type Error = StoreError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        Ok(Group {
            id: GroupId(uuid(&row.id)?),
            category_id: CategoryId(uuid(&row.category_id)?),
            name: row.name,
            description: row.description,
            visibility: parse(&row.visibility)?,
            join_mode: parse(&row.join_mode)?,
            owner_id: UserId(uuid(&row.owner_id)?),
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct MemberRow {
    group_id: String,
    user_id: String,
    joined_at: i64,
}

impl TryFrom<MemberRow> for GroupMember {
    type Error = StoreError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(GroupMember {
            group_id: GroupId(uuid(&row.group_id)?),
            user_id: UserId(uuid(&row.user_id)?),
            joined_at: timestamp(row.joined_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AdminRow {
    group_id: String,
    user_id: String,
    designated_at: i64,
}

impl TryFrom<AdminRow> for GroupAdmin {
    type Error = StoreError;

    fn try_from(row: AdminRow) -> Result<Self, Self::Error> {
        Ok(GroupAdmin {
            group_id: GroupId(uuid(&row.group_id)?),
            user_id: UserId(uuid(&row.user_id)?),
            designated_at: timestamp(row.designated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct InvitationRow {
    id: String,
    group_id: String,
    inviter_id: String,
    invitee_character_id: i64,
    invitee_character_name: String,
    invitee_user_id: Option<String>,
    status: String,
    created_at: i64,
    expires_at: i64,
    responded_at: Option<i64>,
}

impl TryFrom<InvitationRow> for GroupInvitation {
    type Error = StoreError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        Ok(GroupInvitation {
            id: InvitationId(uuid(&row.id)?),
            group_id: GroupId(uuid(&row.group_id)?),
            inviter_id: UserId(uuid(&row.inviter_id)?),
            invitee_character_id: CharacterId(row.invitee_character_id),
            invitee_character_name: row.invitee_character_name,
            invitee_user_id: opt_uuid(row.invitee_user_id.as_deref())?.map(UserId),
            status: parse(&row.status)?,
            created_at: timestamp(row.created_at)?,
            expires_at: timestamp(row.expires_at)?,
            responded_at: opt_timestamp(row.responded_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct JoinRequestRow {
    id: String,
    group_id: String,
    user_id: String,
    reason: Option<String>,
    status: String,
    created_at: i64,
    responded_at: Option<i64>,
    responded_by: Option<String>,
}

impl TryFrom<JoinRequestRow> for GroupJoinRequest {
    type Error = StoreError;

    fn try_from(row: JoinRequestRow) -> Result<Self, Self::Error> {
        Ok(GroupJoinRequest {
            id: JoinRequestId(uuid(&row.id)?),
            group_id: GroupId(uuid(&row.group_id)?),
            user_id: UserId(uuid(&row.user_id)?),
            reason: row.reason,
            status: parse(&row.status)?,
            created_at: timestamp(row.created_at)?,
            responded_at: opt_timestamp(row.responded_at)?,
            responded_by: opt_uuid(row.responded_by.as_deref())?.map(UserId),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct InviteCodeRow {
    id: String,
    group_id: String,
    code: String,
    created_by: String,
    max_uses: Option<i64>,
    current_uses: i64,
    created_at: i64,
    expires_at: i64,
    revoked_at: Option<i64>,
}

impl TryFrom<InviteCodeRow> for GroupInviteCode {
    type Error = StoreError;

    fn try_from(row: InviteCodeRow) -> Result<Self, Self::Error> {
        Ok(GroupInviteCode {
            id: InviteCodeId(uuid(&row.id)?),
            group_id: GroupId(uuid(&row.group_id)?),
            code: row.code,
            created_by: UserId(uuid(&row.created_by)?),
            max_uses: row.max_uses.map(count).transpose()?,
            current_uses: count(row.current_uses)?,
            created_at: timestamp(row.created_at)?,
            expires_at: timestamp(row.expires_at)?,
            revoked_at: opt_timestamp(row.revoked_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RedemptionRow {
    id: String,
    invite_code_id: String,
    user_id: String,
    redeemed_at: i64,
}

impl TryFrom<RedemptionRow> for InviteCodeRedemption {
    type Error = StoreError;

    fn try_from(row: RedemptionRow) -> Result<Self, Self::Error> {
        Ok(InviteCodeRedemption {
            id: RedemptionId(uuid(&row.id)?),
            invite_code_id: InviteCodeId(uuid(&row.invite_code_id)?),
            user_id: UserId(uuid(&row.user_id)?),
            redeemed_at: timestamp(row.redeemed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PermissionCategoryRow {
    id: String,
    name: String,
    description: Option<String>,
    created_at: i64,
}

impl TryFrom<PermissionCategoryRow> for PermissionCategory {
    type Error = StoreError;

    fn try_from(row: PermissionCategoryRow) -> Result<Self, Self::Error> {
        Ok(PermissionCategory {
            id: PermissionCategoryId(uuid(&row.id)?),
            name: row.name,
            description: row.description,
            created_at: timestamp(row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PermissionRow {
    id: String,
    urn: String,
    name: String,
    description: Option<String>,
    category_id: Option<String>,
    created_at: i64,
}

impl TryFrom<PermissionRow> for Permission {
    type Error = StoreError;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        Ok(Permission {
            id: PermissionId(uuid(&row.id)?),
            urn: row.urn,
            name: row.name,
            description: row.description,
            category_id: opt_uuid(row.category_id.as_deref())?.map(PermissionCategoryId),
            created_at: timestamp(row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct GroupPermissionRow {
    id: String,
    group_id: String,
    permission_id: Option<String>,
    custom_urn: Option<String>,
    custom_name: Option<String>,
    custom_description: Option<String>,
    target_type: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<GroupPermissionRow> for GroupPermission {
    type Error = StoreError;

    fn try_from(row: GroupPermissionRow) -> Result<Self, Self::Error> {
        let grant = match (row.permission_id, row.custom_urn, row.custom_name) {
            (Some(permission_id), None, None) => PermissionGrant::Global {
                permission_id: PermissionId(uuid(&permission_id)?),
            },
            (None, Some(urn), Some(name)) => PermissionGrant::Custom {
                urn,
                name,
                description: row.custom_description,
            },
            _ => {
                return Err(StoreError::Backend(format!(
                    "group permission {} has neither or both grant kinds",
                    row.id
                )))
            }
        };
        Ok(GroupPermission {
            id: GroupPermissionId(uuid(&row.id)?),
            group_id: GroupId(uuid(&row.group_id)?),
            grant,
            target_type: parse(&row.target_type)?,
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
        })
    }
}

/// Split a grant into the (permission_id, custom_urn, custom_name, custom_description) columns.
pub(crate) fn grant_columns(
    grant: &PermissionGrant,
) -> (
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
) {
    match grant {
        PermissionGrant::Global { permission_id } => {
            (Some(permission_id.0.to_string()), None, None, None)
        }
        PermissionGrant::Custom {
            urn,
            name,
            description,
        } => (None, Some(urn.clone()), Some(name.clone()), description.clone()),
    }
}

/// Convert a batch of rows, failing on the first bad one.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
