use clap::Parser;

pub mod global;
pub mod root_commands;
pub mod subcommands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `portico` binary.
#[derive(Debug, Parser)]
#[command(name = "portico", version, about = "Portico - multi-tenant admin portal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, table, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Do not persist or restore the session
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

impl Cli {
    #[must_use]
    pub const fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
            ephemeral: self.ephemeral,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use portico_core::enums::UserRole;

    use super::subcommands::{AuthCommands, SettingsCommands, UserCommands};
    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_on_either_side() {
        let cli = Cli::try_parse_from(["portico", "--format", "table", "--ephemeral", "whoami"])
            .expect("cli should parse");
        assert_eq!(cli.format, OutputFormat::Table);
        assert!(cli.global_flags().ephemeral);
        assert!(matches!(cli.command, Commands::Whoami));

        let cli = Cli::try_parse_from(["portico", "whoami", "--format", "raw", "--quiet"])
            .expect("cli should parse");
        assert_eq!(cli.format, OutputFormat::Raw);
        assert!(cli.quiet);
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        assert!(Cli::try_parse_from(["portico", "--format", "xml", "whoami"]).is_err());
    }

    #[test]
    fn login_reads_password_from_flag_or_stdin() {
        let cli = Cli::try_parse_from([
            "portico", "auth", "login", "--email", "ada@acme.test", "--password-stdin",
        ])
        .expect("cli should parse");
        let Commands::Auth {
            action: AuthCommands::Login(args),
        } = cli.command
        else {
            panic!("expected auth login");
        };
        assert_eq!(args.email, "ada@acme.test");
        assert!(args.password.password.is_none());
        assert!(args.password.password_stdin);

        let both = Cli::try_parse_from([
            "portico", "auth", "login", "--email", "a@b.c", "--password", "x", "--password-stdin",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn invite_parses_role_names() {
        let cli = Cli::try_parse_from([
            "portico", "user", "invite", "--email", "new@acme.test", "--first-name", "New",
            "--last-name", "Person", "--role", "org_admin", "--org", "acme",
        ])
        .expect("cli should parse");
        let Commands::User {
            action: UserCommands::Invite(args),
        } = cli.command
        else {
            panic!("expected user invite");
        };
        assert_eq!(args.role, UserRole::OrgAdmin);
        assert_eq!(args.org.as_deref(), Some("acme"));

        assert!(
            Cli::try_parse_from([
                "portico", "user", "invite", "--email", "x@y.z", "--first-name", "X",
                "--last-name", "Y", "--role", "owner",
            ])
            .is_err()
        );
    }

    #[test]
    fn settings_set_scope_flags_conflict() {
        let cli = Cli::try_parse_from(["portico", "settings", "set", "app_name", "Acme", "--global"])
            .expect("cli should parse");
        assert!(matches!(
            cli.command,
            Commands::Settings {
                action: SettingsCommands::Set(ref args)
            } if args.global && args.org.is_none()
        ));

        let conflicting = Cli::try_parse_from([
            "portico", "settings", "set", "app_name", "Acme", "--global", "--org", "acme",
        ]);
        assert!(conflicting.is_err());

        let unscoped = Cli::try_parse_from(["portico", "settings", "set", "app_name", "Acme"]);
        assert!(unscoped.is_err());
    }
}
