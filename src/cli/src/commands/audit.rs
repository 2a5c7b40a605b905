//! Audit log commands.
//!
//! Reading the log is itself recorded by the server.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;
use taskgate_core::audit::AuditRecord;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Show audit entries, newest first
    List {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Only entries recorded for this user id
        #[arg(short, long)]
        actor: Option<i64>,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct AuditRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "When")]
    timestamp: String,
    #[tabled(rename = "Actor")]
    actor: i64,
    #[tabled(rename = "Action")]
    action: String,
}

pub async fn execute(cmd: AuditCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        AuditCommands::List { limit, actor } => {
            let records: Vec<AuditRecord> = client.get("/api/audit-log").await?;
            let records: Vec<AuditRecord> = records
                .into_iter()
                .filter(|r| actor.map_or(true, |a| r.actor_id.get() == a))
                .take(limit)
                .collect();

            match format {
                OutputFormat::Table => {
                    let rows: Vec<AuditRow> = records
                        .iter()
                        .map(|r| AuditRow {
                            id: r.id,
                            timestamp: r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                            actor: r.actor_id.get(),
                            action: r.action.clone(),
                        })
                        .collect();
                    output::print_table(&rows);
                }
                _ => output::print_serialized(&records, format)?,
            }
        }
    }

    Ok(())
}
