use serde::Serialize;

use portico_auth::{Portal, ResolvedSetting};

use crate::cli::GlobalFlags;
use crate::cli::subcommands::{SettingsCommands, SettingsGetArgs};
use crate::commands::Backend;
use crate::output::output;

#[derive(Debug, Serialize)]
struct WrittenSetting<'a> {
    key: &'a str,
    value: &'a str,
    /// `None` for the global row.
    organization_id: Option<&'a str>,
}

/// Resolve a key for `--org`, the global row only with `--global`, or the
/// current user's organization.
pub async fn get<B: Backend>(args: &SettingsGetArgs, portal: &Portal<B>) -> ResolvedSetting {
    let organization_id = if args.global {
        None
    } else {
        args.org
            .clone()
            .or_else(|| portal.current_user().and_then(|user| user.organization_id))
    };
    portal
        .settings()
        .resolve_entry(&args.key, organization_id.as_deref())
        .await
}

/// Handle `portico settings <subcommand>`.
pub async fn handle<B: Backend>(
    action: &SettingsCommands,
    portal: &Portal<B>,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        SettingsCommands::Get(args) => output(&get(args, portal).await, flags.format),
        SettingsCommands::Set(args) => {
            let organization_id = if args.global { None } else { args.org.as_deref() };
            portal
                .settings()
                .update(&args.key, &args.value, organization_id)
                .await?;
            output(
                &WrittenSetting {
                    key: &args.key,
                    value: args.value.trim(),
                    organization_id,
                },
                flags.format,
            )
        }
        SettingsCommands::AppName => output(&portal.settings().current(), flags.format),
    }
}
