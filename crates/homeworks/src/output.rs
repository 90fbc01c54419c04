//! Output formatting: table, JSON, YAML, plain.
//!
//! Table uses `tabled`, structured formats use serde, plain emits one
//! line per item for scripting.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color ────────────────────────────────────────────────────────────

pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Level as a percentage, green when lit and dimmed when off.
pub fn level(value: u8, color: bool) -> String {
    let text = format!("{value:>3}%");
    match (color, value) {
        (false, _) => text,
        (true, 0) => text.dimmed().to_string(),
        (true, _) => text.green().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list in the chosen format. `to_row` feeds the table,
/// `plain_fn` produces one line per item.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => data.iter().map(plain_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render one item. Table output uses `detail_fn` instead of a grid.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        // One object per line, so streams stay line-delimited.
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => plain_fn(data),
    })
}

pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        address: &'static str,
        level: u8,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Address")]
        address: String,
    }

    const ITEMS: [Item; 2] = [
        Item {
            address: "01:04:01:01:05",
            level: 40,
        },
        Item {
            address: "01:04:01:01:06",
            level: 0,
        },
    ];

    fn render(format: OutputFormat) -> String {
        render_list(
            format,
            &ITEMS,
            |i| Row {
                address: i.address.into(),
            },
            |i| format!("{} {}", i.address, i.level),
        )
        .unwrap()
    }

    #[test]
    fn plain_is_one_line_per_item() {
        assert_eq!(
            render(OutputFormat::Plain),
            "01:04:01:01:05 40\n01:04:01:01:06 0"
        );
    }

    #[test]
    fn compact_json_is_a_single_line() {
        let out = render(OutputFormat::JsonCompact);
        assert!(!out.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["level"], 40);
    }

    #[test]
    fn table_has_header_and_rows() {
        let out = render(OutputFormat::Table);
        assert!(out.contains("Address"));
        assert!(out.contains("01:04:01:01:06"));
    }

    #[test]
    fn level_is_uncolored_without_color() {
        assert_eq!(level(7, false), "  7%");
        assert_ne!(level(7, true), "  7%");
    }
}
