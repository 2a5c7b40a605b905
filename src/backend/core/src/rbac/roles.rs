//! The static role → permission table.
//!
//! | Role   | Actions                                                        |
//! |--------|----------------------------------------------------------------|
//! | Owner  | every action                                                   |
//! | Admin  | every action                                                   |
//! | Viewer | `view_task`                                                    |
//!
//! The table is built once on first use and shared read-only for the life of
//! the process. There is no mutation path.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use super::models::{Action, Role};

/// Immutable mapping from role to its permitted actions.
#[derive(Debug)]
pub struct PermissionTable {
    grants: HashMap<Role, HashSet<Action>>,
}

static TABLE: OnceLock<PermissionTable> = OnceLock::new();

impl PermissionTable {
    /// Get the process-wide table.
    pub fn global() -> &'static PermissionTable {
        TABLE.get_or_init(Self::build)
    }

    fn build() -> Self {
        let everything: HashSet<Action> = Action::all().into_iter().collect();

        let mut grants = HashMap::new();
        grants.insert(Role::Owner, everything.clone());
        grants.insert(Role::Admin, everything);
        grants.insert(Role::Viewer, HashSet::from([Action::ViewTask]));

        debug_assert!(Role::all()
            .iter()
            .all(|r| grants.get(r).is_some_and(|set| !set.is_empty())));

        Self { grants }
    }

    /// Check whether `role` may perform `action`.
    pub fn has_permission(&self, role: Role, action: Action) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// Fail-closed check over raw wire values.
    ///
    /// Unknown role ids and unknown action tokens return `false`.
    pub fn permits(&self, role_id: i64, action: &str) -> bool {
        match (Role::from_id(role_id), Action::parse(action)) {
            (Some(role), Some(action)) => self.has_permission(role, action),
            _ => false,
        }
    }

    /// Return the actions granted to `role`.
    pub fn actions_for(&self, role: Role) -> impl Iterator<Item = Action> + '_ {
        self.grants.get(&role).into_iter().flatten().copied()
    }
}

/// Shorthand for `PermissionTable::global().has_permission(role, action)`.
pub fn has_permission(role: Role, action: Action) -> bool {
    PermissionTable::global().has_permission(role, action)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
