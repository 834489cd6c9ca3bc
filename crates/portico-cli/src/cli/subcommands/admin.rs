use clap::Subcommand;

#[derive(Clone, Debug, Subcommand)]
pub enum AdminCommands {
    /// Switch the stored session to another user.
    Impersonate {
        user_id: String,
    },
    /// Mirror portal data into the external database.
    Sync,
}
