//! The permission gate.
//!
//! The gate answers one question before any persistence access happens:
//! "may this caller attempt this kind of operation at all?" Which specific
//! resources the caller may touch is decided later by the scoping engine.

use metrics::counter;
use thiserror::Error;
use tracing::debug;

use super::identity::{Identity, Principal};
use super::models::Action;
use super::roles::PermissionTable;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Reasons an authorization check can fail.
///
/// None of these carry information about the targeted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("No role assigned")]
    NoRoleAssigned,

    #[error("Insufficient permission for this operation")]
    InsufficientPermission,

    #[error("Only the creator or a privileged role may modify this resource")]
    NotOwner,
}

impl PolicyError {
    fn label(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NoRoleAssigned => "no_role",
            Self::InsufficientPermission => "insufficient_permission",
            Self::NotOwner => "not_owner",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The operation may proceed.
    Allow,
    /// The operation is refused, with a reason.
    Deny(PolicyError),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny(reason) => reason.label(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission Gate
// ═══════════════════════════════════════════════════════════════════════════════

/// Stateless coarse authorization over the static permission table.
#[derive(Debug, Clone, Copy)]
pub struct PermissionGate {
    table: &'static PermissionTable,
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionGate {
    pub fn new() -> Self {
        Self {
            table: PermissionTable::global(),
        }
    }

    /// Evaluate `identity` against `required`.
    ///
    /// - an empty `required` set always allows, with or without an identity
    /// - a missing identity is `Unauthenticated`
    /// - a missing or unknown role id is `NoRoleAssigned`
    /// - holding any one of the required actions is enough
    pub fn authorize(&self, identity: Option<&Identity>, required: &[Action]) -> PolicyDecision {
        let decision = self.evaluate(identity, required);

        counter!(
            "taskgate_policy_decisions_total",
            "outcome" => decision.label(),
        )
        .increment(1);

        if let PolicyDecision::Deny(reason) = decision {
            debug!(
                user_id = ?identity.map(|i| i.user_id),
                required = ?required,
                reason = %reason,
                "Permission gate denied request"
            );
        }

        decision
    }

    fn evaluate(&self, identity: Option<&Identity>, required: &[Action]) -> PolicyDecision {
        if required.is_empty() {
            return PolicyDecision::Allow;
        }

        let Some(identity) = identity else {
            return PolicyDecision::Deny(PolicyError::Unauthenticated);
        };

        let Some(role) = identity.role() else {
            return PolicyDecision::Deny(PolicyError::NoRoleAssigned);
        };

        if required
            .iter()
            .any(|action| self.table.has_permission(role, *action))
        {
            PolicyDecision::Allow
        } else {
            PolicyDecision::Deny(PolicyError::InsufficientPermission)
        }
    }

    /// Like [`authorize`](Self::authorize), but yields a [`Principal`] on success.
    ///
    /// Unlike `authorize`, this needs a resolved identity even when `required`
    /// is empty, since a principal without a role cannot be scoped.
    pub fn enforce(
        &self,
        identity: Option<&Identity>,
        required: &[Action],
    ) -> Result<Principal, PolicyError> {
        if let PolicyDecision::Deny(reason) = self.authorize(identity, required) {
            return Err(reason);
        }

        let identity = identity.ok_or(PolicyError::Unauthenticated)?;
        let role = identity.role().ok_or(PolicyError::NoRoleAssigned)?;

        Ok(Principal::new(identity.user_id, role, identity.organization_id))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::models::Role;

    fn gate() -> PermissionGate {
        PermissionGate::new()
    }

    #[test]
    fn test_empty_requirement_always_allows() {
        let viewer = Identity::with_role(1, Role::Viewer, 1);
        let unknown = Identity::new(1, 42, 1);

        assert!(gate().authorize(None, &[]).is_allowed());
        assert!(gate().authorize(Some(&viewer), &[]).is_allowed());
        assert!(gate().authorize(Some(&unknown), &[]).is_allowed());
    }

    #[test]
    fn test_missing_identity_is_unauthenticated() {
        for action in Action::all() {
            assert_eq!(
                gate().authorize(None, &[action]),
                PolicyDecision::Deny(PolicyError::Unauthenticated)
            );
        }
    }

    #[test]
    fn test_unknown_role_is_no_role_assigned() {
        let identity = Identity::new(9, 0, 1);
        assert_eq!(
            gate().authorize(Some(&identity), &[Action::ViewTask]),
            PolicyDecision::Deny(PolicyError::NoRoleAssigned)
        );
    }

    #[test]
    fn test_missing_role_is_no_role_assigned() {
        let identity = Identity::without_role(9, 1);
        assert_eq!(
            gate().authorize(Some(&identity), &[Action::ViewTask]),
            PolicyDecision::Deny(PolicyError::NoRoleAssigned)
        );
        assert_eq!(
            gate().enforce(Some(&identity), &[]),
            Err(PolicyError::NoRoleAssigned)
        );
    }

    #[test]
    fn test_any_single_match_allows() {
        let viewer = Identity::with_role(2, Role::Viewer, 1);
        assert!(gate()
            .authorize(Some(&viewer), &[Action::DeleteTask, Action::ViewTask])
            .is_allowed());
        assert_eq!(
            gate().authorize(Some(&viewer), &[Action::DeleteTask, Action::CreateTask]),
            PolicyDecision::Deny(PolicyError::InsufficientPermission)
        );
    }

    #[test]
    fn test_enforce_yields_principal() {
        let admin = Identity::with_role(3, Role::Admin, 2);
        let principal = gate().enforce(Some(&admin), &[Action::CreateUser]).unwrap();
        assert_eq!(principal.user_id().get(), 3);
        assert_eq!(principal.role(), Role::Admin);
        assert_eq!(principal.organization_id().get(), 2);
    }

    #[test]
    fn test_enforce_requires_identity_even_when_public() {
        assert_eq!(gate().enforce(None, &[]), Err(PolicyError::Unauthenticated));
        let unknown = Identity::new(1, 8, 1);
        assert_eq!(
            gate().enforce(Some(&unknown), &[]),
            Err(PolicyError::NoRoleAssigned)
        );
    }
}
