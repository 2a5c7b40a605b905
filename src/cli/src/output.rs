//! Terminal rendering for command results.
//!
//! Table mode is for people; `json` and `yaml` are for scripts and always
//! print the server's own field names.

use anyhow::Result;
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// How command results are printed.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable tables and key/value lines
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

fn status_line(tag: ColoredString, msg: &str) -> String {
    format!("{} {}", tag.bold(), msg)
}

pub fn print_success(msg: &str) {
    println!("{}", status_line("[OK]".green(), msg));
}

/// Errors go to stderr so piped `json`/`yaml` output stays parseable.
pub fn print_error(msg: &str) {
    eprintln!("{}", status_line("[ERROR]".red(), msg));
}

pub fn print_info(msg: &str) {
    println!("{}", status_line("[INFO]".blue(), msg));
}

/// Rows as a rounded table, ids right-aligned in the first column.
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "Nothing to show.".dimmed());
        return;
    }
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()));
    println!("{table}");
}

/// `value` as text in a machine format. Table mode falls back to JSON.
fn render<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        OutputFormat::Table | OutputFormat::Json => {
            let mut text = serde_json::to_string_pretty(value)?;
            text.push('\n');
            text
        }
    })
}

pub fn print_serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    print!("{}", render(value, format)?);
    Ok(())
}

pub fn print_detail(label: &str, value: &str) {
    println!("  {}: {}", label.cyan(), value);
}

pub fn print_header(title: &str) {
    println!("\n{}\n", title.bold().underline());
}
