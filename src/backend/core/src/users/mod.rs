//! Users: organization-scoped accounts.
//!
//! New accounts always join the creating principal's organization, and a
//! creator can never hand out a role above their own.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::instrument;

use crate::error::{ErrorCode, Result, TaskgateError};
use crate::rbac::{
    AccessEngine, OrganizationId, PolicyError, Principal, ResourceStore, Role, ScopedResource,
    UserId,
};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Local part, `@`, then dot-separated DNS labels. No whitespace anywhere.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@",
        r"[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?",
        r"(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    ))
    .expect("email pattern compiles")
});

// ═══════════════════════════════════════════════════════════════════════════════
// Models
// ═══════════════════════════════════════════════════════════════════════════════

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(rename = "roleId")]
    pub role: Role,
    pub organization_id: OrganizationId,
    /// `None` for seeded or bootstrap accounts.
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub password_hash: String,
}

impl ScopedResource for User {
    const KIND: &'static str = "user";
    type Draft = NewUser;

    fn id(&self) -> i64 {
        self.id
    }

    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    /// Bootstrap accounts count as their own creator.
    fn created_by(&self) -> UserId {
        self.created_by.unwrap_or(UserId(self.id))
    }

    fn audit_label(&self) -> String {
        self.email.clone()
    }
}

/// Validated fields for a user about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Body of `POST /api/users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role_id: i64,
}

impl CreateUserRequest {
    fn validate(&self) -> Result<Role> {
        let email = self.email.trim();
        if !EMAIL_REGEX.is_match(email) {
            return Err(TaskgateError::validation("A valid email address is required")
                .with_context("field", "email"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(TaskgateError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ))
            .with_context("field", "password"));
        }
        Role::from_id(self.role_id).ok_or_else(|| {
            TaskgateError::validation("Unknown role")
                .with_context("field", "roleId")
                .with_context("roleId", self.role_id)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Password Hashing
// ═══════════════════════════════════════════════════════════════════════════════

/// Hash a password with Argon2id on the blocking pool.
pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| TaskgateError::internal(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| TaskgateError::internal(format!("password hashing task failed: {e}")))?
}

// ═══════════════════════════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════════════════════════

/// User operations for a gate-approved principal.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn ResourceStore<User>>,
    engine: AccessEngine,
}

impl UserService {
    pub fn new(store: Arc<dyn ResourceStore<User>>, engine: AccessEngine) -> Self {
        Self { store, engine }
    }

    /// Users whose organization is in the principal's scope.
    #[instrument(skip(self))]
    pub async fn list(&self, principal: Principal) -> Result<Vec<User>> {
        let mut users = self
            .engine
            .session(principal)
            .list_visible(self.store.as_ref())
            .await?;
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    /// Create an account in the principal's organization.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create(&self, principal: Principal, request: CreateUserRequest) -> Result<User> {
        if !principal.role().is_hierarchy_privileged() {
            return Err(PolicyError::InsufficientPermission.into());
        }

        let role = request.validate()?;
        if role.outranks(principal.role()) {
            return Err(TaskgateError::new(
                ErrorCode::InsufficientPermission,
                "Cannot assign a role above your own",
            )
            .with_context("roleId", role.id()));
        }

        let draft = NewUser {
            email: request.email.trim().to_lowercase(),
            password_hash: hash_password(request.password).await?,
            role,
        };

        self.engine
            .session(principal)
            .create(self.store.as_ref(), draft)
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
