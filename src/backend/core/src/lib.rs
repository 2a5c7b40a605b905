#![allow(clippy::result_large_err)]
//! # Taskgate Core
//!
//! Multi-tenant task backend with organization-scoped role-based access
//! control.
//!
//! ## Architecture
//!
//! - **RBAC**: Static permission table, permission gate and per-route layer
//! - **Hierarchy**: Organization tree walk producing each principal's scope
//! - **Scoping**: Visibility filtering and ownership checks for tasks and users
//! - **Audit**: Append-only record of every mutation and privileged read
//! - **Middleware**: Bearer-token authentication producing identity claims
//! - **Storage**: PostgreSQL via sqlx, or an in-process store for development
//! - **Observability**: Structured logging, OTLP tracing and Prometheus metrics

pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod rbac;
pub mod tasks;
pub mod users;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, Result, TaskgateError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::audit::{AuditRecord, AuditRecorder, AuditSink};
    pub use crate::db::{Database, MemoryStore, Store};
    pub use crate::error::{ErrorCode, ErrorDetails, ErrorSeverity, Result, TaskgateError};
    pub use crate::middleware::{AuthLayer, Authenticator, TokenClaims};
    pub use crate::rbac::{
        AccessEngine, Action, HierarchyResolver, Identity, OrgScope, Organization,
        OrganizationDirectory, OrganizationId, Ownership, PermissionGate, PermissionTable,
        PolicyDecision, PolicyError, Principal, RequirePermissionLayer, ResourceStore, Role,
        ScopedResource, UserId,
    };
    pub use crate::tasks::{Task, TaskService, TaskStatus};
    pub use crate::users::{User, UserService};
}
