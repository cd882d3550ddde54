//! Output formatting for CLI

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "text" => OutputFormat::Text,
            _ => OutputFormat::Table,
        }
    }
}

/// Print a row set in the selected format
pub fn print_rows<T: Tabled + Serialize>(rows: &[T], format: &str) {
    if rows.is_empty() {
        println!("(no entries)");
        return;
    }
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string()));
        }
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::sharp());
            println!("{table}");
        }
        OutputFormat::Text => {
            for row in rows {
                let value = serde_json::to_value(row).unwrap_or_default();
                let line: Vec<String> = value
                    .as_object()
                    .map(|o| o.values().map(render_value).collect())
                    .unwrap_or_default();
                println!("{}", line.join("  "));
            }
        }
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
