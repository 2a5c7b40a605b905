//! Task management commands.
//!
//! List, get, create, update and delete tasks visible to the caller.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;
use taskgate_core::tasks::{CreateTaskRequest, Task, TaskStatus, UpdateTaskRequest};

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List tasks in your organization scope
    List {
        /// Only show tasks with this status (Todo, "In Progress", Done)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one task
    Get {
        /// Task ID
        id: i64,
    },

    /// Create a task
    Create {
        /// Task title
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Initial status (Todo, "In Progress", Done)
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long)]
        category: Option<String>,
    },

    /// Update fields of a task
    Update {
        /// Task ID
        id: i64,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        /// Mark the task completed or not
        #[arg(long)]
        completed: Option<bool>,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: i64,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Org")]
    organization: i64,
    #[tabled(rename = "Owner")]
    created_by: i64,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: truncate(&task.title, 48),
            status: task.status.to_string(),
            category: task.category.clone(),
            organization: task.organization_id.get(),
            created_by: task.created_by.get(),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn parse_status(raw: Option<String>) -> Result<Option<TaskStatus>> {
    raw.map(|s| {
        TaskStatus::parse(&s)
            .ok_or_else(|| {
                anyhow::anyhow!("Unknown status '{s}', expected Todo, \"In Progress\" or Done")
            })
    })
    .transpose()
}

fn print_task(task: &Task, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_header(&format!("Task {}", task.id));
            output::print_detail("Title", &task.title);
            output::print_detail("Description", &task.description);
            output::print_detail("Status", task.status.as_str());
            output::print_detail("Category", &task.category);
            output::print_detail("Completed", &task.completed.to_string());
            output::print_detail("Organization", &task.organization_id.to_string());
            output::print_detail("Created by", &task.created_by.to_string());
            output::print_detail("Updated", &task.updated_at.to_rfc3339());
            Ok(())
        }
        _ => output::print_serialized(task, format),
    }
}

pub async fn execute(cmd: TaskCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        TaskCommands::List { status } => {
            let status = parse_status(status)?;
            let mut tasks: Vec<Task> = client.get("/api/tasks").await?;
            if let Some(status) = status {
                tasks.retain(|t| t.status == status);
            }
            match format {
                OutputFormat::Table => {
                    let rows: Vec<TaskRow> = tasks.iter().map(TaskRow::from).collect();
                    output::print_table(&rows);
                }
                _ => output::print_serialized(&tasks, format)?,
            }
        }

        TaskCommands::Get { id } => {
            let task: Task = client.get(&format!("/api/tasks/{id}")).await?;
            print_task(&task, format)?;
        }

        TaskCommands::Create {
            title,
            description,
            status,
            category,
        } => {
            let request = CreateTaskRequest {
                title,
                description,
                status: parse_status(status)?,
                category,
                completed: None,
            };
            let task: Task = client.post("/api/tasks", &request).await?;
            if let OutputFormat::Table = format {
                output::print_success(&format!("Created task {}", task.id));
            }
            print_task(&task, format)?;
        }

        TaskCommands::Update {
            id,
            title,
            description,
            status,
            category,
            completed,
        } => {
            let request = UpdateTaskRequest {
                title,
                description,
                status: parse_status(status)?,
                category,
                completed,
            };
            let task: Task = client.put(&format!("/api/tasks/{id}"), &request).await?;
            if let OutputFormat::Table = format {
                output::print_success(&format!("Updated task {}", task.id));
            }
            print_task(&task, format)?;
        }

        TaskCommands::Delete { id } => {
            let result: serde_json::Value = client.delete(&format!("/api/tasks/{id}")).await?;
            match format {
                OutputFormat::Table => output::print_success(&format!("Deleted task {id}")),
                _ => output::print_serialized(&result, format)?,
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_title() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(
            parse_status(Some("In Progress".into())).unwrap(),
            Some(TaskStatus::InProgress)
        );
        assert!(parse_status(Some("someday".into())).is_err());
    }
}
