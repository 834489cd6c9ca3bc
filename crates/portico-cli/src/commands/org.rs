use portico_auth::Portal;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::OrgCommands;
use crate::commands::Backend;
use crate::output::output;

/// Handle `portico org <subcommand>`.
pub async fn handle<B: Backend>(
    action: &OrgCommands,
    portal: &Portal<B>,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        OrgCommands::List => output(&portal.admin().list_organizations().await?, flags.format),
        OrgCommands::Create(args) => output(
            &portal
                .admin()
                .create_organization(&args.name, &args.shortname)
                .await?,
            flags.format,
        ),
    }
}
