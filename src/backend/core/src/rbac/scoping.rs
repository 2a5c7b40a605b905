//! Resource scoping and ownership.
//!
//! Every read is filtered through the caller's [`OrgScope`]; every mutation is
//! additionally checked against the resource's creator. A resource outside
//! the scope is reported exactly like a resource that does not exist.
//!
//! Successful writes are audited after persistence confirms them. Audit
//! failures never surface here.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use super::hierarchy::{HierarchyResolver, OrgScope};
use super::identity::Principal;
use super::models::{OrganizationId, UserId};
use super::policy::PolicyError;
use crate::audit::AuditRecorder;
use crate::error::{ErrorCode, Result, TaskgateError};

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Traits
// ═══════════════════════════════════════════════════════════════════════════════

/// Who owns a resource. Stamped from the principal at creation, never from
/// client input, and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub organization_id: OrganizationId,
    pub created_by: UserId,
}

impl Ownership {
    pub fn of(principal: &Principal) -> Self {
        Self {
            organization_id: principal.organization_id(),
            created_by: principal.user_id(),
        }
    }
}

/// A resource that belongs to one organization and one creator.
pub trait ScopedResource: Clone + Send + Sync + 'static {
    /// Lowercase kind used in audit entries and not-found messages.
    const KIND: &'static str;

    /// Client-supplied fields for creation. Carries no ownership.
    type Draft: Send + 'static;

    fn id(&self) -> i64;

    fn organization_id(&self) -> OrganizationId;

    fn created_by(&self) -> UserId;

    /// Short human label for audit entries (a title, an email).
    fn audit_label(&self) -> String;

    fn ownership(&self) -> Ownership {
        Ownership {
            organization_id: self.organization_id(),
            created_by: self.created_by(),
        }
    }
}

/// Persistence for one resource kind.
#[async_trait]
pub trait ResourceStore<R: ScopedResource>: Send + Sync {
    /// Every resource owned by an organization in `scope`.
    async fn list_in(&self, scope: &OrgScope) -> Result<Vec<R>>;

    /// Fetch by id regardless of scope.
    async fn get(&self, id: i64) -> Result<Option<R>>;

    async fn insert(&self, draft: R::Draft, ownership: Ownership) -> Result<R>;

    /// Persist changed fields of an existing resource. Last write wins.
    async fn save(&self, resource: &R) -> Result<R>;

    /// Returns `false` if nothing was removed.
    async fn remove(&self, id: i64) -> Result<bool>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Access Engine
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared, request-independent half of the scoping engine.
#[derive(Clone)]
pub struct AccessEngine {
    resolver: HierarchyResolver,
    audit: AuditRecorder,
}

impl AccessEngine {
    pub fn new(resolver: HierarchyResolver, audit: AuditRecorder) -> Self {
        Self { resolver, audit }
    }

    /// Open a per-request session. The scope is resolved at most once per
    /// session and discarded with it.
    pub fn session(&self, principal: Principal) -> AccessSession<'_> {
        AccessSession {
            engine: self,
            principal,
            scope: OnceCell::new(),
        }
    }

    pub fn resolver(&self) -> &HierarchyResolver {
        &self.resolver
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }
}

/// Scoped access for one principal during one request.
pub struct AccessSession<'a> {
    engine: &'a AccessEngine,
    principal: Principal,
    scope: OnceCell<OrgScope>,
}

impl<'a> AccessSession<'a> {
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The caller's visible organizations, resolved on first use.
    pub async fn scope(&self) -> Result<&OrgScope> {
        self.scope
            .get_or_try_init(|| {
                self.engine
                    .resolver
                    .resolve_scope(self.principal.organization_id(), self.principal.role())
            })
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Every resource owned by an organization in scope.
    #[instrument(skip_all, fields(kind = R::KIND, user_id = %self.principal.user_id()))]
    pub async fn list_visible<R: ScopedResource>(
        &self,
        store: &dyn ResourceStore<R>,
    ) -> Result<Vec<R>> {
        let scope = self.scope().await?;
        let mut items = store.list_in(scope).await?;
        items.retain(|item| scope.contains(item.organization_id()));
        debug!(count = items.len(), "Listed visible resources");
        Ok(items)
    }

    /// One resource, or `NotFound` if it is missing or out of scope.
    pub async fn get_one<R: ScopedResource>(
        &self,
        store: &dyn ResourceStore<R>,
        id: i64,
    ) -> Result<R> {
        let scope = self.scope().await?;
        match store.get(id).await? {
            Some(item) if scope.contains(item.organization_id()) => Ok(item),
            _ => Err(TaskgateError::not_found(R::KIND, id)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a resource owned by the principal and the principal's organization.
    #[instrument(skip_all, fields(kind = R::KIND, user_id = %self.principal.user_id()))]
    pub async fn create<R: ScopedResource>(
        &self,
        store: &dyn ResourceStore<R>,
        draft: R::Draft,
    ) -> Result<R> {
        if self.principal.role().is_read_only() {
            return Err(PolicyError::InsufficientPermission.into());
        }

        let created = store.insert(draft, Ownership::of(&self.principal)).await?;
        info!(id = created.id(), org_id = %created.organization_id(), "Resource created");

        self.engine
            .audit
            .record(
                self.principal.user_id(),
                format!("Created {}: {}", R::KIND, created.audit_label()),
            )
            .await;

        Ok(created)
    }

    /// Apply `patch` to a visible resource the principal may modify.
    #[instrument(skip_all, fields(kind = R::KIND, id = id, user_id = %self.principal.user_id()))]
    pub async fn update<R, F>(&self, store: &dyn ResourceStore<R>, id: i64, patch: F) -> Result<R>
    where
        R: ScopedResource,
        F: FnOnce(&mut R) -> Result<()> + Send,
    {
        let existing = self.get_one(store, id).await?;
        self.ensure_can_modify(&existing)?;

        let mut changed = existing.clone();
        patch(&mut changed)?;
        if changed.id() != existing.id() || changed.ownership() != existing.ownership() {
            return Err(TaskgateError::new(
                ErrorCode::InvalidInput,
                "Resource identity and ownership cannot be changed",
            ));
        }

        let saved = store.save(&changed).await?;
        info!("Resource updated");

        self.engine
            .audit
            .record(
                self.principal.user_id(),
                format!("Updated {} ID: {}", R::KIND, id),
            )
            .await;

        Ok(saved)
    }

    /// Delete a visible resource the principal may modify.
    #[instrument(skip_all, fields(kind = R::KIND, id = id, user_id = %self.principal.user_id()))]
    pub async fn delete<R: ScopedResource>(
        &self,
        store: &dyn ResourceStore<R>,
        id: i64,
    ) -> Result<()> {
        let existing = self.get_one(store, id).await?;
        self.ensure_can_modify(&existing)?;

        if !store.remove(id).await? {
            // Removed concurrently between the read and the write.
            return Err(TaskgateError::not_found(R::KIND, id));
        }
        info!("Resource deleted");

        self.engine
            .audit
            .record(
                self.principal.user_id(),
                format!("Deleted {} ID: {}", R::KIND, id),
            )
            .await;

        Ok(())
    }

    /// Creator or privileged role first, then the read-only guard.
    fn ensure_can_modify<R: ScopedResource>(
        &self,
        resource: &R,
    ) -> std::result::Result<(), PolicyError> {
        let role = self.principal.role();
        if resource.created_by() != self.principal.user_id() && !role.is_hierarchy_privileged() {
            return Err(PolicyError::NotOwner);
        }
        if role.is_read_only() {
            return Err(PolicyError::InsufficientPermission);
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditSink;
    use crate::db::MemoryStore;
    use crate::rbac::{Action, Identity, Organization, PermissionGate, Role};
    use crate::tasks::{NewTask, Task};
    use std::sync::Arc;

    async fn fixture() -> (Arc<MemoryStore>, AccessEngine) {
        let store = Arc::new(MemoryStore::new());
        store.insert_organization(Organization::new(1, "HQ"));
        store.insert_organization(Organization::new(2, "Eng").with_parent(1));
        let engine = AccessEngine::new(
            HierarchyResolver::new(store.clone()),
            AuditRecorder::new(store.clone()),
        );
        (store, engine)
    }

    fn principal(user: i64, role: Role, org: i64) -> Principal {
        PermissionGate::new()
            .enforce(Some(&Identity::with_role(user, role, org)), &[])
            .unwrap()
    }

    fn draft(title: &str) -> NewTask {
        NewTask::titled(title)
    }

    #[tokio::test]
    async fn test_scope_is_memoized_per_session() {
        let (store, engine) = fixture().await;
        let session = engine.session(principal(1, Role::Owner, 1));
        let first = session.scope().await.unwrap() as *const OrgScope;
        store.insert_organization(Organization::new(3, "Late").with_parent(1));
        let second = session.scope().await.unwrap() as *const OrgScope;
        assert_eq!(first, second);
        assert!(!session.scope().await.unwrap().contains(OrganizationId(3)));

        let fresh = engine.session(principal(1, Role::Owner, 1));
        assert!(fresh.scope().await.unwrap().contains(OrganizationId(3)));
    }

    #[tokio::test]
    async fn test_create_stamps_ownership_from_principal() {
        let (store, engine) = fixture().await;
        let session = engine.session(principal(10, Role::Admin, 2));
        let task = session.create::<Task>(&*store, draft("write docs")).await.unwrap();
        assert_eq!(task.created_by, UserId(10));
        assert_eq!(task.organization_id, OrganizationId(2));
    }

    #[tokio::test]
    async fn test_viewer_cannot_create() {
        let (store, engine) = fixture().await;
        let session = engine.session(principal(11, Role::Viewer, 1));
        let err = session
            .create::<Task>(&*store, draft("nope"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientPermission);
        assert!(store.list_recent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_scope_is_not_found() {
        let (store, engine) = fixture().await;
        let owner = engine.session(principal(1, Role::Owner, 1));
        let task = owner.create::<Task>(&*store, draft("hq only")).await.unwrap();

        let admin = engine.session(principal(2, Role::Admin, 2));
        let hidden = admin.get_one::<Task>(&*store, task.id).await.unwrap_err();
        let missing = admin.get_one::<Task>(&*store, 9999).await.unwrap_err();
        assert_eq!(hidden.code(), ErrorCode::NotFound);
        assert_eq!(missing.code(), ErrorCode::NotFound);
        assert_eq!(hidden.http_status(), missing.http_status());
    }

    #[tokio::test]
    async fn test_update_checks_ownership_before_read_only() {
        let (store, engine) = fixture().await;
        let admin = engine.session(principal(2, Role::Admin, 1));
        let task = admin.create::<Task>(&*store, draft("admin task")).await.unwrap();

        let viewer = engine.session(principal(3, Role::Viewer, 1));
        let err = viewer
            .update::<Task, _>(&*store, task.id, |t| {
                t.title = "hijacked".into();
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotOwner);
    }

    #[tokio::test]
    async fn test_patch_cannot_reassign_creator() {
        let (store, engine) = fixture().await;
        let owner = engine.session(principal(1, Role::Owner, 1));
        let task = owner.create::<Task>(&*store, draft("mine")).await.unwrap();

        let err = owner
            .update::<Task, _>(&*store, task.id, |t| {
                t.created_by = UserId(77);
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);

        let stored = owner.get_one::<Task>(&*store, task.id).await.unwrap();
        assert_eq!(stored.created_by, UserId(1));
    }

    #[tokio::test]
    async fn test_session_principal_is_gate_output() {
        let (_store, engine) = fixture().await;
        let p = PermissionGate::new()
            .enforce(Some(&Identity::with_role(4, Role::Owner, 1)), &[Action::ViewTask])
            .unwrap();
        let session = engine.session(p);
        assert_eq!(session.principal().user_id(), UserId(4));
    }
}
