use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::services::export::render_csv;

/// Rows from either a bare array or an export request body
pub fn rows_from(input: Value) -> Vec<Value> {
    match input {
        Value::Array(rows) => rows,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

pub fn handle(input: &Path, output: Option<&Path>, output_format: OutputFormat) -> anyhow::Result<()> {
    let text = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let value: Value = serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", input.display()))?;
    let rows = rows_from(value);
    let csv = render_csv(&rows)?;

    match output {
        Some(path) => {
            fs::write(path, &csv).with_context(|| format!("failed to write {}", path.display()))?;
            output_success(
                &output_format,
                &format!("Exported {} rows to {}", rows.len(), path.display()),
                Some(serde_json::json!({ "rows": rows.len(), "output": path.display().to_string() })),
            )
        }
        None => {
            println!("{}", csv);
            Ok(())
        }
    }
}
