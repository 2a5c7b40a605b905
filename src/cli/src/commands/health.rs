//! Health check command.
//!
//! Queries the public `/health` endpoint; no token is needed.

use anyhow::Result;
use clap::Args;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {}

pub async fn execute(_args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (code, health) = client.get_raw("/health").await?;

    match format {
        OutputFormat::Table => {
            let status = health
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");

            output::print_header("System Health");
            output::print_detail("Status", status);
            output::print_detail("HTTP", code.as_str());
            output::print_detail("API URL", client.base_url());

            let fields = [
                ("Backend", "backend"),
                ("Version", "version"),
                ("Timestamp", "timestamp"),
            ];
            for (label, key) in fields {
                if let Some(value) = health.get(key).and_then(|v| v.as_str()) {
                    output::print_detail(label, value);
                }
            }

            if status == "healthy" {
                output::print_success("All systems operational");
            } else {
                output::print_error(&format!("System status: {}", status));
            }
        }
        _ => output::print_serialized(&health, format)?,
    }

    Ok(())
}
