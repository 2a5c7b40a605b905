//! Taskgate CLI - Command-line interface for the Taskgate task API.
//!
//! Provides task, user, audit-log, health, token and configuration commands.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{audit, config, health, task, token, user};
use output::OutputFormat;

/// Taskgate - organization-scoped task management
#[derive(Parser)]
#[command(
    name = "taskgate",
    version,
    about = "Taskgate - organization-scoped task management",
    long_about = "CLI for the Taskgate API: tasks, users, the audit log and local configuration.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "TASKGATE_API_URL")]
    api_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true, env = "TASKGATE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task operations
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// User operations
    #[command(subcommand)]
    User(user::UserCommands),

    /// Audit log
    #[command(subcommand)]
    Audit(audit::AuditCommands),

    /// Check server health
    Health(health::HealthArgs),

    /// Bearer tokens
    #[command(subcommand)]
    Token(token::TokenCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(|| config::lookup(config::ConfigKey::ApiUrl))
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    let token = cli.token.clone().or_else(|| config::lookup(config::ConfigKey::Token));

    let client = client::ApiClient::new(&api_url, token)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Task(cmd) => task::execute(cmd, &client, format).await,
        Commands::User(cmd) => user::execute(cmd, &client, format).await,
        Commands::Audit(cmd) => audit::execute(cmd, &client, format).await,
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Token(cmd) => token::execute(cmd, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        if let Some(hint) = e.downcast_ref::<client::ApiError>().and_then(|api| api.hint()) {
            output::print_info(hint);
        }
        std::process::exit(1);
    }

    Ok(())
}
