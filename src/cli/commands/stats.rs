use anyhow::bail;
use clap::ValueEnum;

use crate::cli::client::{error_message, ApiClient};
use crate::cli::utils::{format_table, output_value};
use crate::cli::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatsKind {
    Applications,
    Forms,
    Users,
    Opportunities,
    Activities,
}

impl StatsKind {
    pub fn path(&self) -> &'static str {
        match self {
            StatsKind::Applications => "/api/dashboard/application-stats",
            StatsKind::Forms => "/api/dashboard/forms-stats",
            StatsKind::Users => "/api/dashboard/user-stats",
            StatsKind::Opportunities => "/api/dashboard/opportunity-stats",
            StatsKind::Activities => "/api/dashboard/recent-activities",
        }
    }
}

pub async fn handle(client: &ApiClient, kind: StatsKind, output_format: OutputFormat) -> anyhow::Result<()> {
    let (status, body) = client.get(kind.path()).await?;
    if !status.is_success() {
        bail!("{} ({})", error_message(&body), status);
    }

    match (&output_format, kind, body.as_array()) {
        (OutputFormat::Text, StatsKind::Activities, Some(items)) => {
            println!("{}", format_table(items, &["timestamp", "type", "status", "title"]));
            Ok(())
        }
        _ => output_value(&output_format, &body),
    }
}
