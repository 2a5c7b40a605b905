//! RBAC data models: identifiers, the closed role enumeration, action tokens,
//! and organization tree nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Strongly-typed organization identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(pub i64);

impl OrganizationId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrganizationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// Raised when a numeric role id has no matching role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown role id: {0}")]
pub struct UnknownRole(pub i64);

/// How far a role's visibility reaches in the organization tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyScope {
    /// The caller's organization and every descendant.
    Subtree,
    /// The caller's organization only.
    OwnOrganization,
}

/// The closed set of roles.
///
/// The numeric ids are persisted and travel inside tokens, so
/// `1 = Owner`, `2 = Admin`, `3 = Viewer` must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Role {
    Owner,
    Admin,
    Viewer,
}

impl Role {
    /// Get the persisted numeric id.
    pub const fn id(&self) -> i64 {
        match self {
            Self::Owner => 1,
            Self::Admin => 2,
            Self::Viewer => 3,
        }
    }

    /// Resolve a numeric id, returning `None` for anything outside the enumeration.
    pub const fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Owner),
            2 => Some(Self::Admin),
            3 => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Get the human-readable name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Admin => "Admin",
            Self::Viewer => "Viewer",
        }
    }

    pub const fn hierarchy_scope(&self) -> HierarchyScope {
        match self {
            Self::Owner => HierarchyScope::Subtree,
            Self::Admin | Self::Viewer => HierarchyScope::OwnOrganization,
        }
    }

    /// Owners and Admins may act on resources they did not create.
    pub const fn is_hierarchy_privileged(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// Viewers never mutate, whatever the permission table says.
    pub const fn is_read_only(&self) -> bool {
        matches!(self, Self::Viewer)
    }

    /// Lower rank number means broader authority.
    const fn rank(&self) -> u8 {
        match self {
            Self::Owner => 0,
            Self::Admin => 1,
            Self::Viewer => 2,
        }
    }

    /// Whether this role carries strictly more authority than `other`.
    pub const fn outranks(&self, other: Role) -> bool {
        self.rank() < other.rank()
    }

    pub const fn all() -> [Role; 3] {
        [Self::Owner, Self::Admin, Self::Viewer]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for Role {
    type Error = UnknownRole;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(UnknownRole(id))
    }
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        role.id()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Action
// ═══════════════════════════════════════════════════════════════════════════════

/// Raised when an action token is not one of the known constants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

/// A coarse, operation-level action token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewTask,
    CreateTask,
    UpdateTask,
    DeleteTask,
    ViewAuditLog,
    ViewUser,
    CreateUser,
}

impl Action {
    /// Return the wire token, e.g. `"view_task"`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ViewTask => "view_task",
            Self::CreateTask => "create_task",
            Self::UpdateTask => "update_task",
            Self::DeleteTask => "delete_task",
            Self::ViewAuditLog => "view_audit_log",
            Self::ViewUser => "view_user",
            Self::CreateUser => "create_user",
        }
    }

    /// Parse a wire token. Unknown tokens yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        Self::all().into_iter().find(|a| a.as_str() == token)
    }

    pub const fn all() -> [Action; 7] {
        [
            Self::ViewTask,
            Self::CreateTask,
            Self::UpdateTask,
            Self::DeleteTask,
            Self::ViewAuditLog,
            Self::ViewUser,
            Self::CreateUser,
        ]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownAction(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Organization
// ═══════════════════════════════════════════════════════════════════════════════

/// A node in the organization forest.
///
/// `child_ids` is whatever persistence reports. It is not trusted to be
/// acyclic or to reference existing nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub parent_id: Option<OrganizationId>,
    pub child_ids: Vec<OrganizationId>,
}

impl Organization {
    pub fn new(id: impl Into<OrganizationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            child_ids: Vec::new(),
        }
    }

    /// Set the parent organization.
    pub fn with_parent(mut self, parent_id: impl Into<OrganizationId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Append child ids.
    pub fn with_children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OrganizationId>,
    {
        self.child_ids.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_id_mapping_is_stable() {
        assert_eq!(Role::Owner.id(), 1);
        assert_eq!(Role::Admin.id(), 2);
        assert_eq!(Role::Viewer.id(), 3);
        assert_eq!(Role::from_id(1), Some(Role::Owner));
        assert_eq!(Role::from_id(2), Some(Role::Admin));
        assert_eq!(Role::from_id(3), Some(Role::Viewer));
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(4), None);
    }

    #[test]
    fn test_role_serde_uses_numeric_id() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "2");
        let role: Role = serde_json::from_str("3").unwrap();
        assert_eq!(role, Role::Viewer);
        assert!(serde_json::from_str::<Role>("7").is_err());
    }

    #[test]
    fn test_hierarchy_scope() {
        assert_eq!(Role::Owner.hierarchy_scope(), HierarchyScope::Subtree);
        assert_eq!(Role::Admin.hierarchy_scope(), HierarchyScope::OwnOrganization);
        assert_eq!(Role::Viewer.hierarchy_scope(), HierarchyScope::OwnOrganization);
    }

    #[test]
    fn test_privilege_flags() {
        assert!(Role::Owner.is_hierarchy_privileged());
        assert!(Role::Admin.is_hierarchy_privileged());
        assert!(!Role::Viewer.is_hierarchy_privileged());
        assert!(Role::Viewer.is_read_only());
        assert!(!Role::Admin.is_read_only());
    }

    #[test]
    fn test_outranks() {
        assert!(Role::Owner.outranks(Role::Admin));
        assert!(Role::Admin.outranks(Role::Viewer));
        assert!(!Role::Admin.outranks(Role::Owner));
        assert!(!Role::Admin.outranks(Role::Admin));
    }

    #[test]
    fn test_action_tokens() {
        for action in Action::all() {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("drop_tables"), None);
        assert_eq!(Action::parse("VIEW_TASK"), None);
        assert!("delete_task".parse::<Action>().is_ok());
    }

    #[test]
    fn test_organization_builder() {
        let org = Organization::new(2, "Engineering")
            .with_parent(1)
            .with_children([4]);
        assert_eq!(org.parent_id, Some(OrganizationId(1)));
        assert_eq!(org.child_ids, vec![OrganizationId(4)]);
        assert!(!org.is_root());
    }
}
