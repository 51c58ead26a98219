//! Output formatting: table or JSON, selected by `--output`.

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render rows as a table, or the full serde value as JSON.
pub fn render<T, R>(format: OutputFormat, data: &T, rows: &[R]) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
    R: Tabled,
{
    match format {
        OutputFormat::Table => Ok(render_table(rows)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
    }
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
