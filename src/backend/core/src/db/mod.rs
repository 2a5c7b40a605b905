//! Database layer for Taskgate.
//!
//! [`Database`] uses PostgreSQL for persistent storage with sqlx.
//! [`MemoryStore`] keeps everything in process for tests and `--in-memory` runs.

pub mod memory;
pub mod seed;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::audit::{AuditRecord, AuditSink, NewAuditRecord};
use crate::config::DatabaseConfig;
use crate::error::{Result, TaskgateError};
use crate::rbac::{
    OrgScope, Organization, OrganizationDirectory, OrganizationId, Ownership, ResourceStore, Role,
    UserId,
};
use crate::tasks::{NewTask, Task, TaskStatus};
use crate::users::{NewUser, User};

// ═══════════════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the server needs from a storage backend.
#[async_trait]
pub trait Store:
    OrganizationDirectory + ResourceStore<Task> + ResourceStore<User> + AuditSink + 'static
{
    /// Short backend name for health output.
    fn backend(&self) -> &'static str;

    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PostgreSQL
// ═══════════════════════════════════════════════════════════════════════════════

/// Database connection and operations.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Database pool ready");
        Ok(Self { pool })
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for Database {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Organizations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OrganizationDirectory for Database {
    async fn get_organization(&self, id: OrganizationId) -> Result<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, parent_id FROM organizations WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let child_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM organizations WHERE parent_id = $1 ORDER BY id",
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Organization {
            id: OrganizationId(row.id),
            name: row.name,
            parent_id: row.parent_id.map(OrganizationId),
            child_ids: child_ids.into_iter().map(OrganizationId).collect(),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

const TASK_COLUMNS: &str = "id, title, description, status, category, completed, \
                            organization_id, created_by, created_at, updated_at";

#[async_trait]
impl ResourceStore<Task> for Database {
    async fn list_in(&self, scope: &OrgScope) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE organization_id = ANY($1) ORDER BY id"
        ))
        .bind(scope.ids())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Task::try_from).transpose()
    }

    async fn insert(&self, draft: NewTask, ownership: Ownership) -> Result<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            INSERT INTO tasks
                (title, description, status, category, completed, organization_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.status.as_str())
        .bind(&draft.category)
        .bind(draft.completed)
        .bind(ownership.organization_id.get())
        .bind(ownership.created_by.get())
        .fetch_one(&self.pool)
        .await?;

        Task::try_from(row)
    }

    async fn save(&self, task: &Task) -> Result<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            UPDATE tasks
            SET title = $2, description = $3, status = $4, category = $5,
                completed = $6, updated_at = $7
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(&task.category)
        .bind(task.completed)
        .bind(task.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Task::try_from(row),
            None => Err(TaskgateError::not_found("task", task.id)),
        }
    }

    async fn remove(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

const USER_COLUMNS: &str =
    "id, email, password_hash, role_id, organization_id, created_by, created_at";

#[async_trait]
impl ResourceStore<User> for Database {
    async fn list_in(&self, scope: &OrgScope) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE organization_id = ANY($1) ORDER BY id"
        ))
        .bind(scope.ids())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn insert(&self, draft: NewUser, ownership: Ownership) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, password_hash, role_id, organization_id, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&draft.email)
        .bind(&draft.password_hash)
        .bind(draft.role.id())
        .bind(ownership.organization_id.get())
        .bind(ownership.created_by.get())
        .fetch_one(&self.pool)
        .await?;

        User::try_from(row)
    }

    async fn save(&self, user: &User) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET email = $2, role_id = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(user.role.id())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => User::try_from(row),
            None => Err(TaskgateError::not_found("user", user.id)),
        }
    }

    async fn remove(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit log
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AuditSink for Database {
    async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord> {
        let row = sqlx::query_as::<_, AuditRow>(
            r#"
            INSERT INTO audit_logs (actor_id, action, timestamp)
            VALUES ($1, $2, $3)
            RETURNING id, actor_id, action, timestamp
            "#,
        )
        .bind(record.actor_id.get())
        .bind(&record.action)
        .bind(record.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_recent(&self) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, actor_id, action, timestamp
            FROM audit_logs
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
pub struct OrganizationRow {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub category: String,
    pub completed: bool,
    pub organization_id: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = TaskgateError;

    fn try_from(row: TaskRow) -> Result<Self> {
        let status = TaskStatus::parse(&row.status).ok_or_else(|| {
            TaskgateError::internal(format!("task {} has unknown status {:?}", row.id, row.status))
        })?;

        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            status,
            category: row.category,
            completed: row.completed,
            organization_id: OrganizationId(row.organization_id),
            created_by: UserId(row.created_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
    pub organization_id: i64,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = TaskgateError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = Role::try_from(row.role_id)
            .map_err(|e| TaskgateError::internal(format!("user {}: {e}", row.id)))?;

        Ok(Self {
            id: row.id,
            email: row.email,
            role,
            organization_id: OrganizationId(row.organization_id),
            created_by: row.created_by.map(UserId),
            created_at: row.created_at,
            password_hash: row.password_hash,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AuditRow {
    pub id: i64,
    pub actor_id: i64,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl From<AuditRow> for AuditRecord {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            actor_id: UserId(row.actor_id),
            action: row.action,
            timestamp: row.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_row_conversion() {
        let now = Utc::now();
        let row = TaskRow {
            id: 3,
            title: "Audit".into(),
            description: String::new(),
            status: "In Progress".into(),
            category: "Work".into(),
            completed: false,
            organization_id: 2,
            created_by: 1,
            created_at: now,
            updated_at: now,
        };
        let task = Task::try_from(row).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.organization_id, OrganizationId(2));
    }

    #[test]
    fn test_user_row_with_unknown_role_is_rejected() {
        let row = UserRow {
            id: 9,
            email: "x@example.com".into(),
            password_hash: String::new(),
            role_id: 4,
            organization_id: 1,
            created_by: None,
            created_at: Utc::now(),
        };
        assert!(User::try_from(row).is_err());
    }
}
