use portico_auth::Portal;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::AdminCommands;
use crate::commands::Backend;
use crate::commands::auth::SessionSummary;
use crate::output::output;

/// Handle `portico admin <subcommand>`.
pub async fn handle<B: Backend>(
    action: &AdminCommands,
    portal: &Portal<B>,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        AdminCommands::Impersonate { user_id } => {
            let session = portal.admin().impersonate(user_id).await?;
            // The stored session now belongs to the impersonated user.
            tracing::warn!(user_id = %user_id, "stored session replaced; `portico auth logout` to end it");
            output(&SessionSummary::from(&session), flags.format)
        }
        AdminCommands::Sync => output(&portal.admin().sync_external_database().await?, flags.format),
    }
}
