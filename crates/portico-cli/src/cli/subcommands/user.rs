use clap::{Args, Subcommand};
use portico_core::enums::UserRole;

#[derive(Clone, Debug, Subcommand)]
pub enum UserCommands {
    /// List users of an organization (defaults to your own).
    List {
        #[arg(long)]
        org: Option<String>,
    },
    /// Create an account with a temporary password and email an invitation.
    Invite(UserInviteArgs),
}

#[derive(Clone, Debug, Args)]
pub struct UserInviteArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    /// One of: user, org_admin, super_admin
    #[arg(long, default_value = "user")]
    pub role: UserRole,
    /// Organization id; required for every role but super_admin.
    #[arg(long)]
    pub org: Option<String>,
}
