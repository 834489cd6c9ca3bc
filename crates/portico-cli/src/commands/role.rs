use portico_auth::Portal;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::RoleCommands;
use crate::commands::Backend;
use crate::output::output;

/// Handle `portico role <subcommand>`.
pub async fn handle<B: Backend>(
    action: &RoleCommands,
    portal: &Portal<B>,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        RoleCommands::List { org } => {
            let organization_id = org
                .clone()
                .or_else(|| portal.current_user().and_then(|user| user.organization_id));
            output(
                &portal.admin().list_roles(organization_id.as_deref()).await?,
                flags.format,
            )
        }
        RoleCommands::Create(args) => {
            let role = portal
                .admin()
                .create_role(&args.name, args.org.as_deref(), args.permissions.clone())
                .await?;
            output(&role, flags.format)
        }
    }
}
