//! Tasks: the primary organization-scoped resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

use crate::error::{Result, TaskgateError};
use crate::rbac::{AccessEngine, OrganizationId, Principal, ResourceStore, ScopedResource, UserId};

/// Maximum title length, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Category given to tasks created without one.
pub const DEFAULT_CATEGORY: &str = "Work";

// ═══════════════════════════════════════════════════════════════════════════════
// Models
// ═══════════════════════════════════════════════════════════════════════════════

/// Workflow state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Todo,
    #[serde(rename = "In Progress", alias = "InProgress")]
    InProgress,
    Done,
}

impl TaskStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Todo" => Some(Self::Todo),
            "In Progress" | "InProgress" => Some(Self::InProgress),
            "Done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub category: String,
    pub completed: bool,
    pub organization_id: OrganizationId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScopedResource for Task {
    const KIND: &'static str = "task";
    type Draft = NewTask;

    fn id(&self) -> i64 {
        self.id
    }

    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn created_by(&self) -> UserId {
        self.created_by
    }

    fn audit_label(&self) -> String {
        self.title.clone()
    }
}

/// Validated fields for a task about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub category: String,
    pub completed: bool,
}

impl NewTask {
    /// A draft with defaults for everything but the title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: TaskStatus::default(),
            category: DEFAULT_CATEGORY.to_string(),
            completed: false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/tasks`.
///
/// Ownership fields are not part of the payload. Any `organizationId` or
/// `createdBy` a client sends is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl CreateTaskRequest {
    /// Validate and turn into an insertable draft.
    pub fn into_draft(self) -> Result<NewTask> {
        let title = validate_title(&self.title)?;
        let mut draft = NewTask::titled(title);
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        if let Some(category) = self.category.filter(|c| !c.trim().is_empty()) {
            draft.category = category;
        }
        if let Some(completed) = self.completed {
            draft.completed = completed;
        }
        Ok(draft)
    }
}

/// Body of `PUT /api/tasks/:id`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl UpdateTaskRequest {
    /// Apply the provided fields to `task`.
    pub fn apply(self, task: &mut Task) -> Result<()> {
        if let Some(title) = self.title {
            task.title = validate_title(&title)?;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        // A blank category keeps the current one.
        if let Some(category) = self.category.filter(|c| !c.trim().is_empty()) {
            task.category = category;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        task.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskgateError::validation("Task title must not be empty")
            .with_context("field", "title"));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(TaskgateError::validation(format!(
            "Task title must be at most {} characters",
            MAX_TITLE_LEN
        ))
        .with_context("field", "title"));
    }
    Ok(trimmed.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Task operations for a gate-approved principal.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn ResourceStore<Task>>,
    engine: AccessEngine,
}

impl TaskService {
    pub fn new(store: Arc<dyn ResourceStore<Task>>, engine: AccessEngine) -> Self {
        Self { store, engine }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, principal: Principal) -> Result<Vec<Task>> {
        let mut tasks = self
            .engine
            .session(principal)
            .list_visible(self.store.as_ref())
            .await?;
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, principal: Principal, id: i64) -> Result<Task> {
        self.engine.session(principal).get_one(self.store.as_ref(), id).await
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, principal: Principal, request: CreateTaskRequest) -> Result<Task> {
        let draft = request.into_draft()?;
        self.engine.session(principal).create(self.store.as_ref(), draft).await
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        principal: Principal,
        id: i64,
        request: UpdateTaskRequest,
    ) -> Result<Task> {
        self.engine
            .session(principal)
            .update(self.store.as_ref(), id, move |task: &mut Task| request.apply(task))
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, principal: Principal, id: i64) -> Result<()> {
        self.engine.session(principal).delete(self.store.as_ref(), id).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
