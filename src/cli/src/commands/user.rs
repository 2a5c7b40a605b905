//! User management commands.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;
use taskgate_core::rbac::Role;
use taskgate_core::users::{CreateUserRequest, User};

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum UserCommands {
    /// List users in your organization scope
    List,

    /// Create a user in your organization
    Create {
        #[arg(short, long)]
        email: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long, env = "TASKGATE_NEW_USER_PASSWORD")]
        password: String,

        /// Role name (owner, admin, viewer) or numeric id
        #[arg(short, long, default_value = "viewer")]
        role: String,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Role")]
    role: &'static str,
    #[tabled(rename = "Org")]
    organization: i64,
    #[tabled(rename = "Created by")]
    created_by: String,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role.name(),
            organization: user.organization_id.get(),
            created_by: user
                .created_by
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Accept `owner`, `Admin`, `3` and so on.
pub(crate) fn parse_role(raw: &str) -> Result<Role> {
    if let Ok(id) = raw.trim().parse::<i64>() {
        return Role::from_id(id).ok_or_else(|| anyhow::anyhow!("Unknown role id {id}"));
    }
    Role::all()
        .into_iter()
        .find(|role| role.name().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| anyhow::anyhow!("Unknown role '{raw}', expected owner, admin or viewer"))
}

pub async fn execute(cmd: UserCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        UserCommands::List => {
            let users: Vec<User> = client.get("/api/users").await?;
            match format {
                OutputFormat::Table => {
                    let rows: Vec<UserRow> = users.iter().map(UserRow::from).collect();
                    output::print_table(&rows);
                }
                _ => output::print_serialized(&users, format)?,
            }
        }

        UserCommands::Create {
            email,
            password,
            role,
        } => {
            let request = CreateUserRequest {
                email,
                password,
                role_id: parse_role(&role)?.id(),
            };
            let user: User = client.post("/api/users", &request).await?;
            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("Created user {} ({})", user.email, user.id));
                    output::print_table(&[UserRow::from(&user)]);
                }
                _ => output::print_serialized(&user, format)?,
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_by_name_and_id() {
        assert_eq!(parse_role("Owner").unwrap(), Role::Owner);
        assert_eq!(parse_role("viewer").unwrap(), Role::Viewer);
        assert_eq!(parse_role("2").unwrap(), Role::Admin);
        assert!(parse_role("9").is_err());
        assert!(parse_role("root").is_err());
    }
}
