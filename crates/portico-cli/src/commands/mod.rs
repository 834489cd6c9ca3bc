use std::io::BufRead;

use anyhow::Context;

use portico_backend::{AuthProvider, Directory};

use crate::cli::subcommands::PasswordArgs;
use crate::cli::{Commands, GlobalFlags};
use crate::context::AppContext;

pub mod admin;
pub mod auth;
pub mod config;
pub mod org;
pub mod role;
pub mod route;
pub mod settings;
pub mod setup;
pub mod user;

/// Everything a command needs from the backend.
pub trait Backend: AuthProvider + Directory + 'static {}

impl<T: AuthProvider + Directory + 'static> Backend for T {}

/// Route a parsed command to its handler.
pub async fn dispatch<B: Backend>(
    command: Commands,
    ctx: &AppContext<B>,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let portal = &ctx.portal;
    match command {
        Commands::Auth { action } => auth::handle(&action, portal, flags).await,
        Commands::Whoami => auth::whoami(portal, flags),
        Commands::Setup(args) => setup::handle(&args, portal, flags).await,
        Commands::Org { action } => org::handle(&action, portal, flags).await,
        Commands::User { action } => user::handle(&action, portal, flags).await,
        Commands::Role { action } => role::handle(&action, portal, flags).await,
        Commands::Settings { action } => settings::handle(&action, portal, flags).await,
        Commands::Route(args) => route::handle(&args, portal, flags).await,
        Commands::Admin { action } => admin::handle(&action, portal, flags).await,
        Commands::Config => config::handle(&ctx.config, flags),
    }
}

/// The password from `--password`, or the first line of stdin.
pub fn read_password(args: &PasswordArgs) -> anyhow::Result<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }
    if !args.password_stdin {
        anyhow::bail!("a password is required: pass --password or --password-stdin");
    }
    read_password_from(std::io::stdin().lock())
}

fn read_password_from(mut reader: impl BufRead) -> anyhow::Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        anyhow::bail!("no password on stdin");
    }
    Ok(password.to_string())
}
