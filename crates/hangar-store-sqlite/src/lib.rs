use chrono::{DateTime, Utc};
use hangar_storage::*;
use sqlx::{sqlite::SqlitePoolOptions, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

mod rows;

use rows::*;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const SELECT_CATEGORY: &str = "SELECT id, name, description, visibility, allow_group_creation, \
     created_at, updated_at FROM categories";
const SELECT_GROUP: &str = "SELECT g.id, g.category_id, g.name, g.description, g.visibility, \
     g.join_mode, g.owner_id, g.created_at, g.updated_at FROM org_groups g";
const SELECT_MEMBER: &str = "SELECT group_id, user_id, joined_at FROM group_members";
const SELECT_ADMIN: &str = "SELECT group_id, user_id, designated_at FROM group_admins";
const SELECT_INVITATION: &str = "SELECT id, group_id, inviter_id, invitee_character_id, \
     invitee_character_name, invitee_user_id, status, created_at, expires_at, responded_at \
     FROM group_invitations";
const SELECT_JOIN_REQUEST: &str = "SELECT id, group_id, user_id, reason, status, created_at, \
     responded_at, responded_by FROM group_join_requests";
const SELECT_INVITE_CODE: &str = "SELECT id, group_id, code, created_by, max_uses, current_uses, \
     created_at, expires_at, revoked_at FROM group_invite_codes";
const SELECT_REDEMPTION: &str =
    "SELECT id, invite_code_id, user_id, redeemed_at FROM group_invite_code_redemptions";
const SELECT_PERMISSION_CATEGORY: &str =
    "SELECT id, name, description, created_at FROM permission_categories";
const SELECT_PERMISSION: &str =
    "SELECT id, urn, name, description, category_id, created_at FROM permissions";
const SELECT_GROUP_PERMISSION: &str = "SELECT id, group_id, permission_id, custom_urn, \
     custom_name, custom_description, target_type, created_at, updated_at FROM group_permissions";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        // A single connection keeps in-memory databases shared and writes serialized.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(backend)?;

        MIGRATOR.run(&pool).await.map_err(backend)?;

        Ok(Self { pool })
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map write failures, surfacing constraint violations as typed errors.
fn write_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::AlreadyExists;
        }
        if db.is_check_violation() {
            return StoreError::Conflict;
        }
    }
    StoreError::Backend(e.to_string())
}

// ─────────────────────────── Connection-scoped helpers ───────────────────────────
//
// These take a bare connection so the same lookups work on the pool and inside a
// transaction.

async fn fetch_category(
    conn: &mut SqliteConnection,
    category_id: &CategoryId,
) -> Result<Category, StoreError> {
    sqlx::query_as::<_, CategoryRow>(&format!("{} WHERE id = ?", SELECT_CATEGORY))
        .bind(category_id.0.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
}

async fn fetch_group(conn: &mut SqliteConnection, group_id: &GroupId) -> Result<Group, StoreError> {
    sqlx::query_as::<_, GroupRow>(&format!("{} WHERE g.id = ?", SELECT_GROUP))
        .bind(group_id.0.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
}

async fn fetch_member(
    conn: &mut SqliteConnection,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<GroupMember, StoreError> {
    sqlx::query_as::<_, MemberRow>(&format!(
        "{} WHERE group_id = ? AND user_id = ?",
        SELECT_MEMBER
    ))
    .bind(group_id.0.to_string())
    .bind(user_id.0.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(backend)?
    .ok_or(StoreError::NotFound)?
    .try_into()
}

async fn fetch_invitation(
    conn: &mut SqliteConnection,
    invitation_id: &InvitationId,
) -> Result<GroupInvitation, StoreError> {
    sqlx::query_as::<_, InvitationRow>(&format!("{} WHERE id = ?", SELECT_INVITATION))
        .bind(invitation_id.0.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
}

async fn fetch_join_request(
    conn: &mut SqliteConnection,
    request_id: &JoinRequestId,
) -> Result<GroupJoinRequest, StoreError> {
    sqlx::query_as::<_, JoinRequestRow>(&format!("{} WHERE id = ?", SELECT_JOIN_REQUEST))
        .bind(request_id.0.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
}

async fn fetch_invite_code(
    conn: &mut SqliteConnection,
    code_id: &InviteCodeId,
) -> Result<GroupInviteCode, StoreError> {
    sqlx::query_as::<_, InviteCodeRow>(&format!("{} WHERE id = ?", SELECT_INVITE_CODE))
        .bind(code_id.0.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
}

async fn fetch_group_permission(
    conn: &mut SqliteConnection,
    group_permission_id: &GroupPermissionId,
) -> Result<GroupPermission, StoreError> {
    sqlx::query_as::<_, GroupPermissionRow>(&format!("{} WHERE id = ?", SELECT_GROUP_PERMISSION))
        .bind(group_permission_id.0.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
}

/// Insert a membership unless one already exists.
async fn ensure_member(
    conn: &mut SqliteConnection,
    group_id: &GroupId,
    user_id: &UserId,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query("INSERT OR IGNORE INTO group_members(group_id, user_id, joined_at) VALUES(?, ?, ?)")
        .bind(group_id.0.to_string())
        .bind(user_id.0.to_string())
        .bind(millis(at))
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;
    Ok(())
}

/// Ordered deletion of a group and everything that hangs off it.
/// Case-folded `LIKE` pattern matching `needle` literally anywhere in the value.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn delete_group_rows(conn: &mut SqliteConnection, group_id: &GroupId) -> Result<(), StoreError> {
    let id = group_id.0.to_string();

    sqlx::query(
        "DELETE FROM group_invite_code_redemptions WHERE invite_code_id IN
         (SELECT id FROM group_invite_codes WHERE group_id = ?)",
    )
    .bind(&id)
    .execute(&mut *conn)
    .await
    .map_err(backend)?;

    for table in [
        "group_invite_codes",
        "group_invitations",
        "group_join_requests",
        "group_permissions",
        "group_admins",
        "group_members",
    ] {
        sqlx::query(&format!("DELETE FROM {} WHERE group_id = ?", table))
            .bind(&id)
            .execute(&mut *conn)
            .await
            .map_err(backend)?;
    }

    let result = sqlx::query("DELETE FROM org_groups WHERE id = ?")
        .bind(&id)
        .execute(&mut *conn)
        .await
        .map_err(backend)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// After a guarded UPDATE touched no row: `NotFound` if the row is missing, else `Conflict`.
async fn missing_or_conflict(
    conn: &mut SqliteConnection,
    table: &str,
    id: &str,
) -> StoreError {
    let exists = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {} WHERE id = ?", table))
        .bind(id)
        .fetch_one(&mut *conn)
        .await;
    match exists {
        Ok(0) => StoreError::NotFound,
        Ok(_) => StoreError::Conflict,
        Err(e) => backend(e),
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Categories ─────────────────────────────

    async fn create_category(
        &self,
        params: &CreateCategoryParams,
    ) -> Result<Category, StoreError> {
        let id = CategoryId(Uuid::now_v7());
        let now = Utc::now();
        let mut conn = self.pool.acquire().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO categories(id, name, description, visibility, allow_group_creation, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(&params.name)
        .bind(&params.description)
        .bind(params.visibility.as_str())
        .bind(params.allow_group_creation.as_str())
        .bind(millis(now))
        .bind(millis(now))
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;

        fetch_category(&mut conn, &id).await
    }

    async fn get_category(&self, category_id: &CategoryId) -> Result<Category, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        fetch_category(&mut conn, category_id).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!("{} ORDER BY name", SELECT_CATEGORY))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        convert_all(rows)
    }

    async fn update_category(
        &self,
        category_id: &CategoryId,
        params: &UpdateCategoryParams,
    ) -> Result<Category, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let current = fetch_category(&mut tx, category_id).await?;

        sqlx::query(
            "UPDATE categories SET name = ?, description = ?, visibility = ?, allow_group_creation = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(params.name.as_ref().unwrap_or(&current.name))
        .bind(params.description.clone().unwrap_or(current.description))
        .bind(params.visibility.unwrap_or(current.visibility).as_str())
        .bind(
            params
                .allow_group_creation
                .unwrap_or(current.allow_group_creation)
                .as_str(),
        )
        .bind(millis(Utc::now()))
        .bind(category_id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        let updated = fetch_category(&mut tx, category_id).await?;
        tx.commit().await.map_err(backend)?;
        Ok(updated)
    }

    async fn delete_category(
        &self,
        category_id: &CategoryId,
        cascade: bool,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        fetch_category(&mut tx, category_id).await?;

        let group_ids = sqlx::query_scalar::<_, String>("SELECT id FROM org_groups WHERE category_id = ?")
            .bind(category_id.0.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(backend)?;

        if !group_ids.is_empty() && !cascade {
            return Err(StoreError::Conflict);
        }

        for id in group_ids {
            let group_id = GroupId(Uuid::try_parse(&id).map_err(backend)?);
            delete_group_rows(&mut tx, &group_id).await?;
        }

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(category_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    // ───────────────────────────── Groups ─────────────────────────────

    async fn create_group(&self, params: &CreateGroupParams) -> Result<Group, StoreError> {
        let id = GroupId(Uuid::now_v7());
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO org_groups(id, category_id, name, description, visibility, join_mode, owner_id, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(params.category_id.0.to_string())
        .bind(&params.name)
        .bind(&params.description)
        .bind(params.visibility.as_str())
        .bind(params.join_mode.as_str())
        .bind(params.owner_id.0.to_string())
        .bind(millis(now))
        .bind(millis(now))
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        ensure_member(&mut tx, &id, &params.owner_id, now).await?;

        let group = fetch_group(&mut tx, &id).await?;
        tx.commit().await.map_err(backend)?;
        Ok(group)
    }

    async fn get_group(&self, group_id: &GroupId) -> Result<Group, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        fetch_group(&mut conn, group_id).await
    }

    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_GROUP);
        if let Some(member_id) = &filter.member_id {
            qb.push(" INNER JOIN group_members gm ON gm.group_id = g.id AND gm.user_id = ")
                .push_bind(member_id.0.to_string());
        }
        qb.push(" WHERE 1 = 1");
        if let Some(category_id) = &filter.category_id {
            qb.push(" AND g.category_id = ")
                .push_bind(category_id.0.to_string());
        }
        if let Some(visibility) = filter.visibility {
            qb.push(" AND g.visibility = ").push_bind(visibility.as_str());
        }
        if let Some(search) = &filter.search {
            qb.push(" AND LOWER(g.name) LIKE ")
                .push_bind(contains_pattern(search))
                .push(" ESCAPE '\\'");
        }
        qb.push(" ORDER BY g.name");

        let rows = qb
            .build_query_as::<GroupRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        convert_all(rows)
    }

    async fn update_group(
        &self,
        group_id: &GroupId,
        params: &UpdateGroupParams,
    ) -> Result<Group, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let current = fetch_group(&mut tx, group_id).await?;

        sqlx::query(
            "UPDATE org_groups SET name = ?, description = ?, visibility = ?, join_mode = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(params.name.as_ref().unwrap_or(&current.name))
        .bind(params.description.clone().unwrap_or(current.description))
        .bind(params.visibility.unwrap_or(current.visibility).as_str())
        .bind(params.join_mode.unwrap_or(current.join_mode).as_str())
        .bind(millis(Utc::now()))
        .bind(group_id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        let updated = fetch_group(&mut tx, group_id).await?;
        tx.commit().await.map_err(backend)?;
        Ok(updated)
    }

    async fn delete_group(&self, group_id: &GroupId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        delete_group_rows(&mut tx, group_id).await?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn transfer_group_ownership(
        &self,
        group_id: &GroupId,
        new_owner_id: &UserId,
    ) -> Result<Group, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let group = fetch_group(&mut tx, group_id).await?;

        match fetch_member(&mut tx, group_id, new_owner_id).await {
            Ok(_) => {}
            Err(StoreError::NotFound) => return Err(StoreError::Conflict),
            Err(e) => return Err(e),
        }

        sqlx::query("UPDATE org_groups SET owner_id = ?, updated_at = ? WHERE id = ?")
            .bind(new_owner_id.0.to_string())
            .bind(millis(now))
            .bind(group_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            "INSERT OR IGNORE INTO group_admins(group_id, user_id, designated_at) VALUES(?, ?, ?)",
        )
        .bind(group_id.0.to_string())
        .bind(group.owner_id.0.to_string())
        .bind(millis(now))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        ensure_member(&mut tx, group_id, &group.owner_id, now).await?;

        let updated = fetch_group(&mut tx, group_id).await?;
        tx.commit().await.map_err(backend)?;
        Ok(updated)
    }

    // ───────────────────────────── Members ─────────────────────────────

    async fn add_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<GroupMember, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        sqlx::query("INSERT INTO group_members(group_id, user_id, joined_at) VALUES(?, ?, ?)")
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .bind(millis(Utc::now()))
            .execute(&mut *conn)
            .await
            .map_err(write_err)?;

        fetch_member(&mut conn, group_id, user_id).await
    }

    async fn remove_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let result = sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        sqlx::query("DELETE FROM group_admins WHERE group_id = ? AND user_id = ?")
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            "DELETE FROM group_join_requests WHERE group_id = ? AND user_id = ? AND status = 'pending'",
        )
        .bind(group_id.0.to_string())
        .bind(user_id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn get_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<GroupMember, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        fetch_member(&mut conn, group_id, user_id).await
    }

    async fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<GroupMember>, StoreError> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "{} WHERE group_id = ? ORDER BY joined_at, user_id",
            SELECT_MEMBER
        ))
        .bind(group_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    async fn list_user_memberships(&self, user_id: &UserId) -> Result<Vec<GroupMember>, StoreError> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "{} WHERE user_id = ? ORDER BY joined_at",
            SELECT_MEMBER
        ))
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    // ───────────────────────────── Admins ─────────────────────────────

    async fn add_group_admin(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<GroupAdmin, StoreError> {
        let now = Utc::now();
        sqlx::query("INSERT INTO group_admins(group_id, user_id, designated_at) VALUES(?, ?, ?)")
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .bind(millis(now))
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        Ok(GroupAdmin {
            group_id: group_id.clone(),
            user_id: user_id.clone(),
            designated_at: now,
        })
    }

    async fn remove_group_admin(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM group_admins WHERE group_id = ? AND user_id = ?")
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn is_group_admin(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, StoreError> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM group_admins WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id.0.to_string())
        .bind(user_id.0.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(n > 0)
    }

    async fn list_group_admins(&self, group_id: &GroupId) -> Result<Vec<GroupAdmin>, StoreError> {
        let rows = sqlx::query_as::<_, AdminRow>(&format!(
            "{} WHERE group_id = ? ORDER BY designated_at, user_id",
            SELECT_ADMIN
        ))
        .bind(group_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    // ───────────────────────────── Invitations ─────────────────────────────

    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<GroupInvitation, StoreError> {
        let id = InvitationId(Uuid::now_v7());
        let mut conn = self.pool.acquire().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO group_invitations(id, group_id, inviter_id, invitee_character_id, invitee_character_name,
                                           invitee_user_id, status, created_at, expires_at)
             VALUES(?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(params.group_id.0.to_string())
        .bind(params.inviter_id.0.to_string())
        .bind(params.invitee_character_id.0)
        .bind(&params.invitee_character_name)
        .bind(params.invitee_user_id.as_ref().map(|u| u.0.to_string()))
        .bind(millis(Utc::now()))
        .bind(millis(params.expires_at))
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;

        fetch_invitation(&mut conn, &id).await
    }

    async fn get_invitation(
        &self,
        invitation_id: &InvitationId,
    ) -> Result<GroupInvitation, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        fetch_invitation(&mut conn, invitation_id).await
    }

    async fn list_group_invitations(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<GroupInvitation>, StoreError> {
        let rows = sqlx::query_as::<_, InvitationRow>(&format!(
            "{} WHERE group_id = ? ORDER BY created_at DESC",
            SELECT_INVITATION
        ))
        .bind(group_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    async fn list_pending_invitations_for(
        &self,
        user_id: &UserId,
        character_ids: &[CharacterId],
    ) -> Result<Vec<GroupInvitation>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_INVITATION);
        qb.push(" WHERE status = 'pending' AND (invitee_user_id = ")
            .push_bind(user_id.0.to_string());
        if !character_ids.is_empty() {
            qb.push(" OR invitee_character_id IN (");
            let mut separated = qb.separated(", ");
            for character_id in character_ids {
                separated.push_bind(character_id.0);
            }
            separated.push_unseparated(")");
        }
        qb.push(") ORDER BY created_at DESC");

        let rows = qb
            .build_query_as::<InvitationRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        convert_all(rows)
    }

    async fn find_pending_invitation(
        &self,
        group_id: &GroupId,
        character_id: &CharacterId,
    ) -> Result<Option<GroupInvitation>, StoreError> {
        let row = sqlx::query_as::<_, InvitationRow>(&format!(
            "{} WHERE group_id = ? AND invitee_character_id = ? AND status = 'pending'",
            SELECT_INVITATION
        ))
        .bind(group_id.0.to_string())
        .bind(character_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(GroupInvitation::try_from).transpose()
    }

    async fn accept_invitation(
        &self,
        invitation_id: &InvitationId,
        user_id: &UserId,
    ) -> Result<GroupInvitation, StoreError> {
        let now = Utc::now();
        let id = invitation_id.0.to_string();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let result = sqlx::query(
            "UPDATE group_invitations SET status = 'accepted', invitee_user_id = ?, responded_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(user_id.0.to_string())
        .bind(millis(now))
        .bind(&id)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(missing_or_conflict(&mut tx, "group_invitations", &id).await);
        }

        let invitation = fetch_invitation(&mut tx, invitation_id).await?;
        ensure_member(&mut tx, &invitation.group_id, user_id, now).await?;

        tx.commit().await.map_err(backend)?;
        Ok(invitation)
    }

    async fn close_invitation(
        &self,
        invitation_id: &InvitationId,
        status: InvitationStatus,
    ) -> Result<GroupInvitation, StoreError> {
        let id = invitation_id.0.to_string();
        let mut conn = self.pool.acquire().await.map_err(backend)?;

        let result = sqlx::query(
            "UPDATE group_invitations SET status = ?, responded_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(millis(Utc::now()))
        .bind(&id)
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;
        if result.rows_affected() == 0 {
            return Err(missing_or_conflict(&mut conn, "group_invitations", &id).await);
        }

        fetch_invitation(&mut conn, invitation_id).await
    }

    // ───────────────────────────── Join Requests ─────────────────────────────

    async fn create_join_request(
        &self,
        params: &CreateJoinRequestParams,
    ) -> Result<GroupJoinRequest, StoreError> {
        let id = JoinRequestId(Uuid::now_v7());
        let mut conn = self.pool.acquire().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO group_join_requests(id, group_id, user_id, reason, status, created_at)
             VALUES(?, ?, ?, ?, 'pending', ?)",
        )
        .bind(id.0.to_string())
        .bind(params.group_id.0.to_string())
        .bind(params.user_id.0.to_string())
        .bind(&params.reason)
        .bind(millis(Utc::now()))
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;

        fetch_join_request(&mut conn, &id).await
    }

    async fn get_join_request(
        &self,
        request_id: &JoinRequestId,
    ) -> Result<GroupJoinRequest, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        fetch_join_request(&mut conn, request_id).await
    }

    async fn list_join_requests(
        &self,
        group_id: &GroupId,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<GroupJoinRequest>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_JOIN_REQUEST);
        qb.push(" WHERE group_id = ").push_bind(group_id.0.to_string());
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY created_at");

        let rows = qb
            .build_query_as::<JoinRequestRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        convert_all(rows)
    }

    async fn list_user_join_requests(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<GroupJoinRequest>, StoreError> {
        let rows = sqlx::query_as::<_, JoinRequestRow>(&format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC",
            SELECT_JOIN_REQUEST
        ))
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    async fn respond_join_request(
        &self,
        request_id: &JoinRequestId,
        status: JoinRequestStatus,
        responded_by: &UserId,
    ) -> Result<GroupJoinRequest, StoreError> {
        let now = Utc::now();
        let id = request_id.0.to_string();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let result = sqlx::query(
            "UPDATE group_join_requests SET status = ?, responded_at = ?, responded_by = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(millis(now))
        .bind(responded_by.0.to_string())
        .bind(&id)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;
        if result.rows_affected() == 0 {
            return Err(missing_or_conflict(&mut tx, "group_join_requests", &id).await);
        }

        let request = fetch_join_request(&mut tx, request_id).await?;
        if status == JoinRequestStatus::Approved {
            ensure_member(&mut tx, &request.group_id, &request.user_id, now).await?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(request)
    }

    async fn delete_join_request(&self, request_id: &JoinRequestId) -> Result<(), StoreError> {
        let id = request_id.0.to_string();
        let mut conn = self.pool.acquire().await.map_err(backend)?;

        let result = sqlx::query("DELETE FROM group_join_requests WHERE id = ? AND status = 'pending'")
            .bind(&id)
            .execute(&mut *conn)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(missing_or_conflict(&mut conn, "group_join_requests", &id).await);
        }
        Ok(())
    }

    // ───────────────────────────── Invite Codes ─────────────────────────────

    async fn create_invite_code(
        &self,
        params: &CreateInviteCodeParams,
    ) -> Result<GroupInviteCode, StoreError> {
        let id = InviteCodeId(Uuid::now_v7());
        let mut conn = self.pool.acquire().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO group_invite_codes(id, group_id, code, created_by, max_uses, current_uses, created_at, expires_at)
             VALUES(?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(params.group_id.0.to_string())
        .bind(&params.code)
        .bind(params.created_by.0.to_string())
        .bind(params.max_uses.map(i64::from))
        .bind(millis(Utc::now()))
        .bind(millis(params.expires_at))
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;

        fetch_invite_code(&mut conn, &id).await
    }

    async fn get_invite_code(&self, code_id: &InviteCodeId) -> Result<GroupInviteCode, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        fetch_invite_code(&mut conn, code_id).await
    }

    async fn get_invite_code_by_code(&self, code: &str) -> Result<GroupInviteCode, StoreError> {
        sqlx::query_as::<_, InviteCodeRow>(&format!("{} WHERE code = ?", SELECT_INVITE_CODE))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn list_invite_codes(&self, group_id: &GroupId) -> Result<Vec<GroupInviteCode>, StoreError> {
        let rows = sqlx::query_as::<_, InviteCodeRow>(&format!(
            "{} WHERE group_id = ? ORDER BY created_at DESC",
            SELECT_INVITE_CODE
        ))
        .bind(group_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    async fn revoke_invite_code(
        &self,
        code_id: &InviteCodeId,
        revoked_at: DateTime<Utc>,
    ) -> Result<GroupInviteCode, StoreError> {
        let id = code_id.0.to_string();
        let mut conn = self.pool.acquire().await.map_err(backend)?;

        let result = sqlx::query(
            "UPDATE group_invite_codes SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL",
        )
        .bind(millis(revoked_at))
        .bind(&id)
        .execute(&mut *conn)
        .await
        .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(missing_or_conflict(&mut conn, "group_invite_codes", &id).await);
        }

        fetch_invite_code(&mut conn, code_id).await
    }

    async fn redeem_invite_code(
        &self,
        code_id: &InviteCodeId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<InviteCodeRedemption, StoreError> {
        let id = code_id.0.to_string();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Guarded increment: the use count only moves while the code is still redeemable.
        let result = sqlx::query(
            "UPDATE group_invite_codes SET current_uses = current_uses + 1
             WHERE id = ? AND revoked_at IS NULL AND expires_at > ?
               AND (max_uses IS NULL OR current_uses < max_uses)",
        )
        .bind(&id)
        .bind(millis(now))
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;
        if result.rows_affected() == 0 {
            return Err(missing_or_conflict(&mut tx, "group_invite_codes", &id).await);
        }

        let code = fetch_invite_code(&mut tx, code_id).await?;

        sqlx::query("INSERT INTO group_members(group_id, user_id, joined_at) VALUES(?, ?, ?)")
            .bind(code.group_id.0.to_string())
            .bind(user_id.0.to_string())
            .bind(millis(now))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

        let redemption = InviteCodeRedemption {
            id: RedemptionId(Uuid::now_v7()),
            invite_code_id: code_id.clone(),
            user_id: user_id.clone(),
            redeemed_at: now,
        };
        sqlx::query(
            "INSERT INTO group_invite_code_redemptions(id, invite_code_id, user_id, redeemed_at)
             VALUES(?, ?, ?, ?)",
        )
        .bind(redemption.id.0.to_string())
        .bind(&id)
        .bind(user_id.0.to_string())
        .bind(millis(now))
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        tx.commit().await.map_err(backend)?;
        Ok(redemption)
    }

    async fn list_invite_code_redemptions(
        &self,
        code_id: &InviteCodeId,
    ) -> Result<Vec<InviteCodeRedemption>, StoreError> {
        let rows = sqlx::query_as::<_, RedemptionRow>(&format!(
            "{} WHERE invite_code_id = ? ORDER BY redeemed_at",
            SELECT_REDEMPTION
        ))
        .bind(code_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    // ───────────────────────────── Permissions ─────────────────────────────

    async fn create_permission_category(
        &self,
        params: &CreatePermissionCategoryParams,
    ) -> Result<PermissionCategory, StoreError> {
        let category = PermissionCategory {
            id: PermissionCategoryId(Uuid::now_v7()),
            name: params.name.clone(),
            description: params.description.clone(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO permission_categories(id, name, description, created_at) VALUES(?, ?, ?, ?)",
        )
        .bind(category.id.0.to_string())
        .bind(&category.name)
        .bind(&category.description)
        .bind(millis(category.created_at))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(category)
    }

    async fn list_permission_categories(&self) -> Result<Vec<PermissionCategory>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionCategoryRow>(&format!(
            "{} ORDER BY name",
            SELECT_PERMISSION_CATEGORY
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    async fn create_permission(
        &self,
        params: &CreatePermissionParams,
    ) -> Result<Permission, StoreError> {
        let id = PermissionId(Uuid::now_v7());
        sqlx::query(
            "INSERT INTO permissions(id, urn, name, description, category_id, created_at)
             VALUES(?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(&params.urn)
        .bind(&params.name)
        .bind(&params.description)
        .bind(params.category_id.as_ref().map(|c| c.0.to_string()))
        .bind(millis(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        self.get_permission(&id).await
    }

    async fn get_permission(&self, permission_id: &PermissionId) -> Result<Permission, StoreError> {
        sqlx::query_as::<_, PermissionRow>(&format!("{} WHERE id = ?", SELECT_PERMISSION))
            .bind(permission_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(&format!("{} ORDER BY urn", SELECT_PERMISSION))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        convert_all(rows)
    }

    async fn create_group_permission(
        &self,
        params: &CreateGroupPermissionParams,
    ) -> Result<GroupPermission, StoreError> {
        let id = GroupPermissionId(Uuid::now_v7());
        let now = Utc::now();
        let (permission_id, urn, name, description) = grant_columns(&params.grant);
        let mut conn = self.pool.acquire().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO group_permissions(id, group_id, permission_id, custom_urn, custom_name, custom_description,
                                           target_type, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(params.group_id.0.to_string())
        .bind(permission_id)
        .bind(urn)
        .bind(name)
        .bind(description)
        .bind(params.target_type.as_str())
        .bind(millis(now))
        .bind(millis(now))
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;

        fetch_group_permission(&mut conn, &id).await
    }

    async fn get_group_permission(
        &self,
        group_permission_id: &GroupPermissionId,
    ) -> Result<GroupPermission, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        fetch_group_permission(&mut conn, group_permission_id).await
    }

    async fn update_group_permission(
        &self,
        group_permission_id: &GroupPermissionId,
        params: &UpdateGroupPermissionParams,
    ) -> Result<GroupPermission, StoreError> {
        let (permission_id, urn, name, description) = grant_columns(&params.grant);
        let mut conn = self.pool.acquire().await.map_err(backend)?;

        let result = sqlx::query(
            "UPDATE group_permissions SET permission_id = ?, custom_urn = ?, custom_name = ?,
                    custom_description = ?, target_type = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(permission_id)
        .bind(urn)
        .bind(name)
        .bind(description)
        .bind(params.target_type.as_str())
        .bind(millis(Utc::now()))
        .bind(group_permission_id.0.to_string())
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        fetch_group_permission(&mut conn, group_permission_id).await
    }

    async fn delete_group_permission(
        &self,
        group_permission_id: &GroupPermissionId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM group_permissions WHERE id = ?")
            .bind(group_permission_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_group_permissions(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<GroupPermission>, StoreError> {
        let rows = sqlx::query_as::<_, GroupPermissionRow>(&format!(
            "{} WHERE group_id = ? ORDER BY created_at, id",
            SELECT_GROUP_PERMISSION
        ))
        .bind(group_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }
}
