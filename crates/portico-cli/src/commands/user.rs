use portico_auth::admin::InviteUser;
use portico_auth::{AuthError, Portal};

use crate::cli::GlobalFlags;
use crate::cli::subcommands::UserCommands;
use crate::commands::Backend;
use crate::output::output;

/// `--org` if given, else the signed-in user's organization.
pub fn target_organization<B: Backend>(
    portal: &Portal<B>,
    org: Option<&str>,
) -> anyhow::Result<String> {
    if let Some(org) = org {
        return Ok(org.to_string());
    }
    let user = portal.current_user().ok_or(AuthError::NotAuthenticated)?;
    user.organization_id
        .ok_or_else(|| anyhow::anyhow!("you do not belong to an organization; pass --org"))
}

/// Handle `portico user <subcommand>`.
pub async fn handle<B: Backend>(
    action: &UserCommands,
    portal: &Portal<B>,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        UserCommands::List { org } => {
            let organization_id = target_organization(portal, org.as_deref())?;
            output(&portal.admin().list_users(&organization_id).await?, flags.format)
        }
        UserCommands::Invite(args) => {
            let invited = portal
                .admin()
                .invite_user(&InviteUser {
                    email: args.email.clone(),
                    first_name: args.first_name.clone(),
                    last_name: args.last_name.clone(),
                    role: args.role,
                    organization_id: args.org.clone(),
                })
                .await?;
            output(&invited, flags.format)
        }
    }
}
