use clap::{Args, Subcommand};

use crate::cli::subcommands::{
    AdminCommands, AuthCommands, OrgCommands, PasswordArgs, RoleCommands, SettingsCommands,
    UserCommands,
};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Sign in, sign out and manage passwords.
    Auth {
        #[command(subcommand)]
        action: AuthCommands,
    },
    /// Show the current user's profile.
    Whoami,
    /// Bootstrap the first organization and super admin.
    Setup(SetupArgs),
    /// Organizations.
    Org {
        #[command(subcommand)]
        action: OrgCommands,
    },
    /// Users.
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Roles.
    Role {
        #[command(subcommand)]
        action: RoleCommands,
    },
    /// Organization and global settings.
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
    /// Check where navigating to a portal path would end up.
    Route(RouteArgs),
    /// Super admin tools.
    Admin {
        #[command(subcommand)]
        action: AdminCommands,
    },
    /// Show the effective configuration (secrets redacted).
    Config,
}

#[derive(Clone, Debug, Args)]
pub struct SetupArgs {
    /// Name of the first organization.
    #[arg(long)]
    pub org_name: String,
    /// Shortname of the first organization (lowercase, digits, hyphens).
    #[arg(long)]
    pub org_shortname: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[command(flatten)]
    pub password: PasswordArgs,
    /// Repeat the password. Defaults to the password itself.
    #[arg(long)]
    pub confirm: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct RouteArgs {
    /// Portal path, e.g. `/organizations` or `reset-password?type=recovery`.
    pub path: String,
}
