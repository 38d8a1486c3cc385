use anyhow::bail;
use serde_json::Value;

use crate::cli::client::{error_message, ApiClient};
use crate::cli::utils::{output_success, output_value};
use crate::cli::OutputFormat;

pub async fn handle(client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let (status, body) = client.get("/health").await?;
    let state = body
        .pointer("/data/status")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    if !status.is_success() {
        if matches!(output_format, OutputFormat::Json) {
            output_value(&output_format, &body)?;
        }
        bail!("{} is {} ({}): {}", client.url("/health"), state, status, error_message(&body));
    }
    output_success(&output_format, &format!("{} is {}", client.url(""), state), body.get("data").cloned())
}
