use portico_auth::Portal;
use portico_auth::admin::SetupForm;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SetupArgs;
use crate::commands::{Backend, read_password};
use crate::output::output;

/// Handle `portico setup`.
pub async fn handle<B: Backend>(
    args: &SetupArgs,
    portal: &Portal<B>,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let password = read_password(&args.password)?;
    let form = SetupForm {
        org_name: args.org_name.clone(),
        org_shortname: args.org_shortname.clone(),
        email: args.email.clone(),
        password_confirmation: args.confirm.clone().unwrap_or_else(|| password.clone()),
        password,
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
    };
    let outcome = portal.admin().initial_setup(&form).await?;
    if !outcome.signed_in {
        tracing::info!("setup complete; confirm the email address, then run `portico auth login`");
    }
    output(&outcome, flags.format)
}
