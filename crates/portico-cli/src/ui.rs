//! Terminal-dependent table rendering, decided once at start-up.

use std::io::IsTerminal;
use std::sync::OnceLock;

use crate::cli::{GlobalFlags, OutputFormat};
use crate::output::table::TableOptions;

/// Narrower `COLUMNS` values are ignored rather than squeezing every cell.
const MIN_COLUMNS: usize = 40;

/// What the process knows about where stdout goes.
#[derive(Clone, Debug, Default)]
pub struct Terminal {
    pub stdout_tty: bool,
    pub no_color: bool,
    pub columns: Option<String>,
}

impl Terminal {
    fn detect() -> Self {
        Self {
            stdout_tty: std::io::stdout().is_terminal(),
            no_color: std::env::var_os("NO_COLOR").is_some(),
            columns: std::env::var("COLUMNS").ok(),
        }
    }
}

static TABLE_OPTIONS: OnceLock<TableOptions> = OnceLock::new();

/// Highlight headers only for interactive table output; fit to `COLUMNS`
/// when it is a usable width.
#[must_use]
pub fn options_for(flags: &GlobalFlags, terminal: &Terminal) -> TableOptions {
    let color = flags.format == OutputFormat::Table
        && !flags.quiet
        && terminal.stdout_tty
        && !terminal.no_color;
    let max_width = terminal
        .columns
        .as_deref()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|width| *width >= MIN_COLUMNS);
    TableOptions { max_width, color }
}

pub fn init(flags: &GlobalFlags) {
    let _ = TABLE_OPTIONS.set(options_for(flags, &Terminal::detect()));
}

/// Options fixed by [`init`]; plain and unbounded before it ran.
#[must_use]
pub fn table_options() -> TableOptions {
    TABLE_OPTIONS.get().copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn flags(format: OutputFormat, quiet: bool) -> GlobalFlags {
        GlobalFlags {
            format,
            quiet,
            verbose: false,
            ephemeral: false,
        }
    }

    fn tty(columns: Option<&str>) -> Terminal {
        Terminal {
            stdout_tty: true,
            no_color: false,
            columns: columns.map(str::to_string),
        }
    }

    #[test]
    fn interactive_table_is_colored_and_fitted() {
        let options = options_for(&flags(OutputFormat::Table, false), &tty(Some("100")));
        assert_eq!(
            options,
            TableOptions {
                max_width: Some(100),
                color: true,
            }
        );
    }

    #[test]
    fn color_is_off_when_piped_quiet_or_disabled() {
        let table = flags(OutputFormat::Table, false);
        let piped = Terminal {
            stdout_tty: false,
            ..tty(None)
        };
        let no_color = Terminal {
            no_color: true,
            ..tty(None)
        };
        assert!(!options_for(&table, &piped).color);
        assert!(!options_for(&table, &no_color).color);
        assert!(!options_for(&flags(OutputFormat::Table, true), &tty(None)).color);
        assert!(!options_for(&flags(OutputFormat::Json, false), &tty(None)).color);
    }

    #[test]
    fn unusable_columns_leave_width_unbounded() {
        let table = flags(OutputFormat::Table, false);
        assert_eq!(options_for(&table, &tty(Some("20"))).max_width, None);
        assert_eq!(options_for(&table, &tty(Some("wide"))).max_width, None);
        assert_eq!(options_for(&table, &tty(None)).max_width, None);
    }
}
