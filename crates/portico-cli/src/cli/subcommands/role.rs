use clap::{Args, Subcommand};

#[derive(Clone, Debug, Subcommand)]
pub enum RoleCommands {
    /// List system roles plus the organization's custom roles.
    List {
        #[arg(long)]
        org: Option<String>,
    },
    /// Create a custom role.
    Create(RoleCreateArgs),
}

#[derive(Clone, Debug, Args)]
pub struct RoleCreateArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub org: Option<String>,
    /// Permission granted by the role. Repeatable.
    #[arg(long = "permission")]
    pub permissions: Vec<String>,
}
