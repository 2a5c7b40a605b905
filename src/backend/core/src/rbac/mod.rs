//! Role-based access control scoped by organization hierarchy.
//!
//! This module provides:
//! - **Models**: roles, action tokens, organization nodes
//! - **Permission Table**: the fixed role → action mapping
//! - **Identity**: decoded claims and gate-approved principals
//! - **Permission Gate**: coarse allow/deny before any persistence access
//! - **Hierarchy Resolver**: the set of organizations a role may observe
//! - **Scoping Engine**: visibility filtering and ownership checks per resource
//! - **Authorization Middleware**: tower layer running the gate per route
//!
//! # Usage
//!
//! ```rust,ignore
//! use taskgate_core::rbac::{Action, PermissionGate};
//!
//! let principal = PermissionGate::new().enforce(Some(&identity), &[Action::UpdateTask])?;
//! let session = engine.session(principal);
//! let task = session.update::<Task, _>(&*store, task_id, |t| request.apply(t)).await?;
//! ```

pub mod hierarchy;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod roles;
pub mod scoping;

pub use hierarchy::{HierarchyResolver, OrgScope, OrganizationDirectory};
pub use identity::{Identity, Principal};
pub use middleware::{RequirePermissionLayer, RequirePermissionService};
pub use models::{
    Action, HierarchyScope, Organization, OrganizationId, Role, UnknownAction, UnknownRole,
    UserId,
};
pub use policy::{PermissionGate, PolicyDecision, PolicyError};
pub use roles::{has_permission, PermissionTable};
pub use scoping::{AccessEngine, AccessSession, Ownership, ResourceStore, ScopedResource};
