use clap::{Args, Subcommand};

/// Authentication commands.
#[derive(Clone, Debug, Subcommand)]
pub enum AuthCommands {
    /// Sign in with email and password.
    Login(AuthLoginArgs),
    /// Sign out and clear the stored session.
    Logout,
    /// Show session status.
    Status,
    /// Exchange the refresh token for a new session.
    Refresh,
    /// Email a password reset link.
    ResetPassword(AuthResetArgs),
    /// Finish a password reset with the token from the emailed link.
    Recover(AuthRecoverArgs),
    /// Change the signed-in user's password.
    UpdatePassword(AuthUpdatePasswordArgs),
}

#[derive(Clone, Debug, Args)]
pub struct PasswordArgs {
    #[arg(long, conflicts_with = "password_stdin")]
    pub password: Option<String>,
    /// Read the password from the first line of stdin.
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Clone, Debug, Args)]
pub struct AuthLoginArgs {
    #[arg(long)]
    pub email: String,
    #[command(flatten)]
    pub password: PasswordArgs,
}

#[derive(Clone, Debug, Args)]
pub struct AuthResetArgs {
    #[arg(long)]
    pub email: String,
}

#[derive(Clone, Debug, Args)]
pub struct AuthRecoverArgs {
    /// `token_hash` query parameter of the reset link.
    #[arg(long)]
    pub token: String,
    #[command(flatten)]
    pub password: PasswordArgs,
    /// Repeat the new password. Defaults to the password itself.
    #[arg(long)]
    pub confirm: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct AuthUpdatePasswordArgs {
    #[command(flatten)]
    pub password: PasswordArgs,
    /// Repeat the new password. Defaults to the password itself.
    #[arg(long)]
    pub confirm: Option<String>,
}
