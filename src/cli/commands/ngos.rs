use anyhow::bail;
use serde_json::Value;

use crate::cli::client::{error_message, ApiClient};
use crate::cli::utils::{format_table, output_value};
use crate::cli::OutputFormat;

const COLUMNS: &[&str] = &["name", "email", "jobs_count", "fundings_count", "trainings_count"];

pub async fn handle(client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let (status, body) = client.get("/api/public/ngos").await?;
    if !status.is_success() {
        bail!("{} ({})", error_message(&body), status);
    }

    match output_format {
        OutputFormat::Json => output_value(&output_format, &body),
        OutputFormat::Text => {
            let ngos = body.get("ngos").and_then(Value::as_array).cloned().unwrap_or_default();
            if ngos.is_empty() {
                println!("No approved NGOs");
            } else {
                println!("{}", format_table(&ngos, COLUMNS));
            }
            Ok(())
        }
    }
}
