use clap::{Args, Subcommand};

#[derive(Clone, Debug, Subcommand)]
pub enum OrgCommands {
    /// List organizations visible to the current user.
    List,
    /// Create an organization (super admin).
    Create(OrgCreateArgs),
}

#[derive(Clone, Debug, Args)]
pub struct OrgCreateArgs {
    #[arg(long)]
    pub name: String,
    /// Lowercase letters, digits and hyphens.
    #[arg(long)]
    pub shortname: String,
}
