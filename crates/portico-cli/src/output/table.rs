//! Plain aligned tables for `--format table`.

const MIN_COLUMN: usize = 4;
const GAP: &str = "  ";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableOptions {
    pub max_width: Option<usize>,
    pub color: bool,
}

/// Render `rows` under `headers`, shrinking the widest columns until the
/// table fits `max_width`.
#[must_use]
pub fn render(headers: &[&str], rows: &[Vec<String>], options: TableOptions) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    if let Some(max_width) = options.max_width {
        shrink(&mut widths, max_width);
    }

    let header = join_cells(headers.iter().copied(), &widths, |cell| cell.to_string());
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(header.trim_end().to_string());
    lines.push("=".repeat(header.trim_end().chars().count()));
    for row in rows {
        let line = join_cells(row.iter().map(String::as_str), &widths, |cell| {
            if options.color {
                highlight(cell)
            } else {
                cell.to_string()
            }
        });
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

fn shrink(widths: &mut [usize], max_width: usize) {
    let gaps = widths.len().saturating_sub(1) * GAP.len();
    while widths.iter().sum::<usize>() + gaps > max_width {
        let Some(widest) = widths
            .iter_mut()
            .filter(|width| **width > MIN_COLUMN)
            .max_by_key(|width| **width)
        else {
            return;
        };
        *widest -= 1;
    }
}

fn join_cells<'a>(
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
    paint: impl Fn(&str) -> String,
) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| {
            let fitted = fit(cell, *width);
            let pad = width.saturating_sub(fitted.chars().count());
            format!("{}{}", paint(&fitted), " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join(GAP)
}

fn fit(cell: &str, width: usize) -> String {
    if cell.chars().count() <= width {
        return cell.to_string();
    }
    let mut out: String = cell.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Color access outcomes: green for granted, red for refused.
fn highlight(cell: &str) -> String {
    let code = match cell {
        "allow" | "proceed" | "authenticated" | "true" | "organization" => "32",
        "redirect" | "deny_unauthenticated" | "deny_forbidden" | "anonymous" | "false" => "31",
        "fallback" => "33",
        _ => return cell.to_string(),
    };
    format!("\u{1b}[{code}m{cell}\u{1b}[0m")
}
