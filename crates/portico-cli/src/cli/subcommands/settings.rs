use clap::{Args, Subcommand};

#[derive(Clone, Debug, Subcommand)]
pub enum SettingsCommands {
    /// Resolve a setting: organization override, then global, then fallback.
    Get(SettingsGetArgs),
    /// Write an organization-scoped or global setting.
    Set(SettingsSetArgs),
    /// Show the application name resolved for the current user.
    AppName,
}

#[derive(Clone, Debug, Args)]
pub struct SettingsGetArgs {
    pub key: String,
    /// Resolve for this organization instead of the current user's.
    #[arg(long, conflicts_with = "global")]
    pub org: Option<String>,
    /// Skip the organization step.
    #[arg(long)]
    pub global: bool,
}

#[derive(Clone, Debug, Args)]
#[command(group(clap::ArgGroup::new("scope").required(true).args(["org", "global"])))]
pub struct SettingsSetArgs {
    pub key: String,
    pub value: String,
    #[arg(long)]
    pub org: Option<String>,
    /// Write the global row (super admin).
    #[arg(long)]
    pub global: bool,
}
