use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::ui;

pub mod table;

/// Render a serializable response in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Raw => Ok(serde_json::to_string(value)?),
        OutputFormat::Table => Ok(render_table(serde_json::to_value(value)?, ui::table_options())),
    }
}

/// Print a serializable response to stdout.
pub fn output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render(value, format)?);
    Ok(())
}

/// Arrays of objects become one row per item; a single object becomes
/// key/value rows.
fn render_table(value: Value, options: table::TableOptions) -> String {
    match value {
        Value::Array(items) if items.is_empty() => String::from("(no rows)"),
        Value::Array(items) if items.iter().all(Value::is_object) => {
            let mut headers: Vec<String> = Vec::new();
            for item in &items {
                for key in item.as_object().into_iter().flat_map(serde_json::Map::keys) {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
            }
            let rows: Vec<Vec<String>> = items
                .iter()
                .map(|item| {
                    headers
                        .iter()
                        .map(|header| item.get(header).map_or_else(|| "-".to_string(), cell))
                        .collect()
                })
                .collect();
            let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
            table::render(&header_refs, &rows, options)
        }
        Value::Array(items) => {
            let rows: Vec<Vec<String>> = items.iter().map(|item| vec![cell(item)]).collect();
            table::render(&["value"], &rows, options)
        }
        Value::Object(map) => {
            let rows: Vec<Vec<String>> = map
                .iter()
                .map(|(key, value)| vec![key.clone(), cell(value)])
                .collect();
            table::render(&["key", "value"], &rows, options)
        }
        scalar => table::render(&["value"], &[vec![cell(&scalar)]], options),
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Outcome {
        path: &'static str,
        outcome: &'static str,
        route: Option<&'static str>,
    }

    const PLAIN: table::TableOptions = table::TableOptions {
        max_width: None,
        color: false,
    };

    #[test]
    fn raw_is_single_line_json() {
        let value = Outcome {
            path: "/organizations",
            outcome: "redirect",
            route: Some("unauthorized"),
        };
        let out = render(&value, OutputFormat::Raw).unwrap();
        assert!(!out.contains('\n'));
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["route"], "unauthorized");
    }

    #[test]
    fn object_renders_as_key_value_rows() {
        let value = Outcome {
            path: "/login",
            outcome: "proceed",
            route: None,
        };
        let out = render_table(serde_json::to_value(&value).unwrap(), PLAIN);
        assert!(out.lines().next().is_some_and(|line| line.starts_with("key")));
        assert!(out.lines().any(|line| line.starts_with("route") && line.ends_with('-')));
    }

    #[test]
    fn object_arrays_share_columns() {
        let out = render_table(
            json!([
                { "id": "org-1", "shortname": "acme" },
                { "id": "org-2", "name": "Globex" }
            ]),
            PLAIN,
        );
        let header = out.lines().next().unwrap();
        assert!(header.contains("id") && header.contains("shortname") && header.contains("name"));
        assert_eq!(out.lines().count(), 4);
    }

    #[test]
    fn empty_list_has_placeholder() {
        assert_eq!(render_table(json!([]), PLAIN), "(no rows)");
    }
}
