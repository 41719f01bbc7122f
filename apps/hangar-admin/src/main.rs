use std::sync::Arc;

use clap::{Parser, Subcommand};
use hangar_groups::{Caller, EngineConfig, GroupService, MemoryCharacterDirectory, NewGroup};
use hangar_storage::{
    CategoryId, CreateCategoryParams, CreatePermissionParams, GroupCreationPolicy, GroupFilter,
    GroupId, InviteCodeId, JoinMode, PermissionId, TargetType, UserId, Visibility,
};
use hangar_store_sqlite::SqliteStore;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "hangar-admin")]
#[command(about = "Hangar operator CLI for group and permission administration")]
struct Cli {
    /// Database URL (sqlite://path/to/db.db)
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "sqlite://hangar.db?mode=rwc"
    )]
    database_url: String,

    /// Act as this user (defaults to the operator identity, which is a global admin)
    #[arg(long, global = true)]
    as_user: Option<Uuid>,

    /// Grant global administrator authority to --as-user
    #[arg(long, global = true)]
    admin: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Group category commands
    Category {
        #[command(subcommand)]
        category_cmd: CategoryCommand,
    },
    /// Group commands
    Group {
        #[command(subcommand)]
        group_cmd: GroupCommand,
    },
    /// Permission registry and attachment commands
    Permission {
        #[command(subcommand)]
        permission_cmd: PermissionCommand,
    },
    /// Invite code commands
    InviteCode {
        #[command(subcommand)]
        invite_code_cmd: InviteCodeCommand,
    },
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// Create a category
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// public, hidden or system
        #[arg(long, default_value = "public")]
        visibility: Visibility,
        /// anyone or admin_only
        #[arg(long, default_value = "anyone")]
        allow_group_creation: GroupCreationPolicy,
    },
    /// List categories visible to the caller
    List,
    /// Delete a category
    Delete {
        id: Uuid,
        /// Delete the category's groups as well
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand)]
enum GroupCommand {
    /// Create a group owned by the caller
    Create {
        /// Category ID
        #[arg(long)]
        category: Uuid,
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// public, hidden or system
        #[arg(long, default_value = "public")]
        visibility: Visibility,
        /// open, approval or invitation_only
        #[arg(long, default_value = "open")]
        join_mode: JoinMode,
    },
    /// List groups visible to the caller
    List {
        /// Only groups in this category
        #[arg(long)]
        category: Option<Uuid>,
        /// Case-insensitive name search
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a group with its admins and member count
    Show { id: Uuid },
    /// Transfer group ownership to an existing member
    Transfer {
        id: Uuid,
        /// New owner's user ID
        #[arg(long)]
        to: Uuid,
    },
}

#[derive(Subcommand)]
enum PermissionCommand {
    /// Register a global permission
    Create {
        /// Permission URN (e.g. urn:hangar:fleet:command)
        urn: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List the global permission registry
    List,
    /// Attach a global permission to a group
    Attach {
        /// Group ID
        #[arg(long)]
        group: Uuid,
        /// Permission ID
        #[arg(long)]
        permission: Uuid,
        /// all_members, all_admins, owner_only or owner_and_admins
        #[arg(long, default_value = "all_members")]
        target: TargetType,
    },
}

#[derive(Subcommand)]
enum InviteCodeCommand {
    /// Create a shareable invite code
    Create {
        /// Group ID
        #[arg(long)]
        group: Uuid,
        /// Maximum redemptions (unlimited when omitted)
        #[arg(long)]
        max_uses: Option<u32>,
        /// Days until the code expires
        #[arg(long, default_value = "7")]
        expires_days: u32,
        /// Output only the code (for scripts)
        #[arg(long)]
        plain: bool,
    },
    /// List a group's invite codes
    List {
        /// Group ID
        #[arg(long)]
        group: Uuid,
    },
    /// Revoke an invite code
    Revoke {
        /// Invite code ID
        id: Uuid,
    },
}

// ────────────────────────────────────── Commands ──────────────────────────────────────

type Service = GroupService<SqliteStore>;

async fn cmd_category(
    svc: &Service,
    caller: &Caller,
    cmd: CategoryCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        CategoryCommand::Create {
            name,
            description,
            visibility,
            allow_group_creation,
        } => {
            let category = svc
                .create_category(
                    caller,
                    CreateCategoryParams {
                        name,
                        description,
                        visibility,
                        allow_group_creation,
                    },
                )
                .await?;
            println!("✓ Category created!\n");
            println!("ID:         {}", category.id.0);
            println!("Name:       {}", category.name);
            println!("Visibility: {}", category.visibility.as_str());
        }
        CategoryCommand::List => {
            let categories = svc.list_categories(caller).await?;
            if categories.is_empty() {
                println!("No categories found");
                return Ok(());
            }
            println!("Categories:");
            for category in categories {
                println!(
                    "  {} {} ({}, creation: {})",
                    category.id.0,
                    category.name,
                    category.visibility.as_str(),
                    category.allow_group_creation.as_str()
                );
            }
        }
        CategoryCommand::Delete { id, cascade } => {
            svc.delete_category(caller, &CategoryId(id), cascade).await?;
            println!("✓ Category {} deleted", id);
        }
    }
    Ok(())
}

async fn cmd_group(
    svc: &Service,
    caller: &Caller,
    cmd: GroupCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        GroupCommand::Create {
            category,
            name,
            description,
            visibility,
            join_mode,
        } => {
            let group = svc
                .create_group(
                    caller,
                    NewGroup {
                        category_id: CategoryId(category),
                        name,
                        description,
                        visibility,
                        join_mode,
                    },
                )
                .await?;
            println!("✓ Group created!\n");
            println!("ID:        {}", group.id.0);
            println!("Name:      {}", group.name);
            println!("Owner:     {}", group.owner_id.0);
            println!("Join mode: {}", group.join_mode.as_str());
        }
        GroupCommand::List { category, search } => {
            let filter = GroupFilter {
                category_id: category.map(CategoryId),
                search,
                ..Default::default()
            };
            let groups = svc.list_groups(caller, filter).await?;
            if groups.is_empty() {
                println!("No groups found");
                return Ok(());
            }
            println!("Groups:");
            for group in groups {
                println!(
                    "  {} {} ({}, {})",
                    group.id.0,
                    group.name,
                    group.visibility.as_str(),
                    group.join_mode.as_str()
                );
            }
        }
        GroupCommand::Show { id } => {
            let details = svc.get_group(caller, &GroupId(id)).await?;
            let group = &details.group;
            println!("Group:      {}", group.name);
            println!("ID:         {}", group.id.0);
            if let Some(description) = &group.description {
                println!("About:      {}", description);
            }
            println!("Category:   {}", group.category_id.0);
            println!("Visibility: {}", group.visibility.as_str());
            println!("Join mode:  {}", group.join_mode.as_str());
            println!("Owner:      {}", group.owner_id.0);
            println!("Members:    {}", details.member_count);
            println!("Your role:  {}", details.caller_role.as_str());
            if !details.admin_ids.is_empty() {
                println!("Admins:");
                for admin in &details.admin_ids {
                    println!("  {}", admin.0);
                }
            }
        }
        GroupCommand::Transfer { id, to } => {
            let group = svc
                .transfer_ownership(caller, &GroupId(id), &UserId(to))
                .await?;
            println!("✓ {} is now owned by {}", group.name, group.owner_id.0);
        }
    }
    Ok(())
}

async fn cmd_permission(
    svc: &Service,
    caller: &Caller,
    cmd: PermissionCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        PermissionCommand::Create {
            urn,
            name,
            description,
        } => {
            let permission = svc
                .create_permission(
                    caller,
                    CreatePermissionParams {
                        urn,
                        name,
                        description,
                        category_id: None,
                    },
                )
                .await?;
            println!("✓ Permission registered!\n");
            println!("ID:  {}", permission.id.0);
            println!("URN: {}", permission.urn);
        }
        PermissionCommand::List => {
            let permissions = svc.list_permissions().await?;
            if permissions.is_empty() {
                println!("No permissions registered");
                return Ok(());
            }
            println!("Permissions:");
            for permission in permissions {
                println!(
                    "  {} {} - {}",
                    permission.id.0, permission.urn, permission.name
                );
            }
        }
        PermissionCommand::Attach {
            group,
            permission,
            target,
        } => {
            let attached = svc
                .attach_permission(caller, &GroupId(group), &PermissionId(permission), target)
                .await?;
            println!(
                "✓ Permission attached to group {} for {} ({})",
                group,
                attached.target_type.as_str(),
                attached.id.0
            );
        }
    }
    Ok(())
}

async fn cmd_invite_code(
    svc: &Service,
    caller: &Caller,
    cmd: InviteCodeCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        InviteCodeCommand::Create {
            group,
            max_uses,
            expires_days,
            plain,
        } => {
            let code = svc
                .create_invite_code(caller, &GroupId(group), max_uses, expires_days)
                .await?;
            if plain {
                println!("{}", code.code);
            } else {
                println!("✓ Invite code created!\n");
                println!("Code:     {}", code.code);
                println!("ID:       {}", code.id.0);
                match code.max_uses {
                    Some(max) => println!("Max uses: {}", max),
                    None => println!("Max uses: unlimited"),
                }
                println!("Expires:  {}", code.expires_at);
            }
        }
        InviteCodeCommand::List { group } => {
            let codes = svc.list_invite_codes(caller, &GroupId(group)).await?;
            if codes.is_empty() {
                println!("No invite codes found");
                return Ok(());
            }
            println!("Invite codes:");
            for code in codes {
                let uses = match code.max_uses {
                    Some(max) => format!("{}/{}", code.current_uses, max),
                    None => format!("{}/∞", code.current_uses),
                };
                let state = if code.is_revoked() { " [revoked]" } else { "" };
                println!(
                    "  {} {} uses {} expires {}{}",
                    code.id.0, code.code, uses, code.expires_at, state
                );
            }
        }
        InviteCodeCommand::Revoke { id } => {
            let code = svc.revoke_invite_code(caller, &InviteCodeId(id)).await?;
            println!("✓ Invite code {} revoked", code.code);
        }
    }
    Ok(())
}

// ────────────────────────────────────── Main ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Without --as-user the CLI runs as the operator, which always has global authority.
    let caller = match cli.as_user {
        Some(user) => Caller {
            user_id: UserId(user),
            is_admin: cli.admin,
        },
        None => Caller::admin(UserId(Uuid::nil())),
    };

    let config = EngineConfig::from_env()?;
    info!(database_url = %cli.database_url, "opening store");
    let store = Arc::new(SqliteStore::open(&cli.database_url).await?);
    let svc = GroupService::new(store, Arc::new(MemoryCharacterDirectory::new()), config);

    match cli.command {
        Command::Category { category_cmd } => cmd_category(&svc, &caller, category_cmd).await?,
        Command::Group { group_cmd } => cmd_group(&svc, &caller, group_cmd).await?,
        Command::Permission { permission_cmd } => {
            cmd_permission(&svc, &caller, permission_cmd).await?
        }
        Command::InviteCode { invite_code_cmd } => {
            cmd_invite_code(&svc, &caller, invite_code_cmd).await?
        }
    }

    Ok(())
}
