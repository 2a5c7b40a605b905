//! Who is asking.
//!
//! [`Identity`] is the typed claim set decoded once at the token boundary.
//! [`Principal`] is an identity that has passed the permission gate; it can
//! only be produced by [`PermissionGate::enforce`](super::PermissionGate::enforce),
//! so holding one proves the coarse check already ran.

use serde::Serialize;

use super::models::{OrganizationId, Role, UserId};

/// Decoded, trusted claims for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
    /// The numeric role id exactly as carried by the token, if any.
    pub role_id: Option<i64>,
    pub organization_id: OrganizationId,
}

impl Identity {
    pub fn new(
        user_id: impl Into<UserId>,
        role_id: i64,
        organization_id: impl Into<OrganizationId>,
    ) -> Self {
        Self {
            role_id: Some(role_id),
            ..Self::without_role(user_id, organization_id)
        }
    }

    /// Build an identity for a known role.
    pub fn with_role(
        user_id: impl Into<UserId>,
        role: Role,
        organization_id: impl Into<OrganizationId>,
    ) -> Self {
        Self::new(user_id, role.id(), organization_id)
    }

    /// An identity whose token carried no role at all.
    pub fn without_role(
        user_id: impl Into<UserId>,
        organization_id: impl Into<OrganizationId>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            role_id: None,
            organization_id: organization_id.into(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// The resolved role, or `None` if the token carried no id or an unknown one.
    pub fn role(&self) -> Option<Role> {
        self.role_id.and_then(Role::from_id)
    }
}

/// An identity whose role resolved and whose coarse permission check passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    user_id: UserId,
    role: Role,
    organization_id: OrganizationId,
}

impl Principal {
    pub(crate) fn new(user_id: UserId, role: Role, organization_id: OrganizationId) -> Self {
        Self {
            user_id,
            role,
            organization_id,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_role_resolution() {
        let identity = Identity::new(7, 2, 1);
        assert_eq!(identity.role(), Some(Role::Admin));

        let unknown = Identity::new(7, 99, 1);
        assert_eq!(unknown.role(), None);
    }

    #[test]
    fn test_identity_serializes_camel_case() {
        let identity = Identity::with_role(5, Role::Owner, 3).with_email("o@example.com");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["userId"], 5);
        assert_eq!(json["roleId"], 1);
        assert_eq!(json["organizationId"], 3);
        assert_eq!(json["email"], "o@example.com");
    }
}
