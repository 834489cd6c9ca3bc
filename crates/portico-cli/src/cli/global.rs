use clap::ValueEnum;

/// How a command's response is printed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// Aligned columns for people.
    Table,
    /// Single-line JSON for pipes.
    Raw,
}

/// Flags accepted on either side of the subcommand.
#[derive(Clone, Debug)]
pub struct GlobalFlags {
    pub format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    /// Keep the session in memory only; nothing is read from or written to
    /// the keyring or credentials file.
    pub ephemeral: bool,
}

impl GlobalFlags {
    /// Log filter used when `PORTICO_LOG` is unset. Quiet wins over verbose.
    #[must_use]
    pub const fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(quiet: bool, verbose: bool) -> GlobalFlags {
        GlobalFlags {
            format: OutputFormat::Json,
            quiet,
            verbose,
            ephemeral: false,
        }
    }

    #[test]
    fn log_level_follows_quiet_then_verbose() {
        assert_eq!(flags(false, false).default_log_level(), "warn");
        assert_eq!(flags(false, true).default_log_level(), "debug");
        assert_eq!(flags(true, true).default_log_level(), "error");
    }
}
