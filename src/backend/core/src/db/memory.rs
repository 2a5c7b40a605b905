//! In-process store for tests and `--in-memory` runs.
//!
//! Concurrent maps per table, an append-only audit vector, and monotonic id
//! sequences. Nothing here validates the organization tree: callers may store
//! cyclic or dangling edges on purpose.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use super::Store;
use crate::audit::{AuditRecord, AuditSink, NewAuditRecord};
use crate::error::{Result, TaskgateError};
use crate::rbac::{
    OrgScope, Organization, OrganizationDirectory, OrganizationId, Ownership, ResourceStore, Role,
};
use crate::tasks::{NewTask, Task};
use crate::users::{NewUser, User};

/// Thread-safe in-memory implementation of every storage trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    organizations: DashMap<OrganizationId, Organization>,
    tasks: DashMap<i64, Task>,
    users: DashMap<i64, User>,
    emails: DashMap<String, i64>,
    audit: RwLock<Vec<AuditRecord>>,
    task_seq: AtomicI64,
    user_seq: AtomicI64,
    audit_seq: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Organization tree
    // ─────────────────────────────────────────────────────────────────────────

    /// Store `org` and link it into its parent's child list.
    pub fn insert_organization(&self, org: Organization) {
        if let Some(parent_id) = org.parent_id {
            if let Some(mut parent) = self.organizations.get_mut(&parent_id) {
                if !parent.child_ids.contains(&org.id) {
                    parent.child_ids.push(org.id);
                }
            }
        }
        self.organizations.insert(org.id, org);
    }

    /// Store `org` exactly as given, without touching any other node.
    pub fn put_organization(&self, org: Organization) {
        self.organizations.insert(org.id, org);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an account with no creator, as seeding and bootstrap do.
    pub fn insert_bootstrap_user(
        &self,
        email: &str,
        password_hash: String,
        role: Role,
        organization_id: OrganizationId,
    ) -> Result<User> {
        let id = self.claim_email(email)?;
        let user = User {
            id,
            email: email.to_string(),
            role,
            organization_id,
            created_by: None,
            created_at: Utc::now(),
            password_hash,
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    fn claim_email(&self, email: &str) -> Result<i64> {
        match self.emails.entry(email.to_lowercase()) {
            Entry::Occupied(_) => Err(TaskgateError::duplicate("user", "email")),
            Entry::Vacant(slot) => {
                let id = self.user_seq.fetch_add(1, Ordering::SeqCst) + 1;
                slot.insert(id);
                Ok(id)
            }
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl OrganizationDirectory for MemoryStore {
    async fn get_organization(&self, id: OrganizationId) -> Result<Option<Organization>> {
        Ok(self.organizations.get(&id).map(|org| org.clone()))
    }
}

#[async_trait]
impl ResourceStore<Task> for MemoryStore {
    async fn list_in(&self, scope: &OrgScope) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| scope.contains(entry.organization_id))
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn get(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.tasks.get(&id).map(|t| t.clone()))
    }

    async fn insert(&self, draft: NewTask, ownership: Ownership) -> Result<Task> {
        let id = self.task_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let task = Task {
            id,
            title: draft.title,
            description: draft.description,
            status: draft.status,
            category: draft.category,
            completed: draft.completed,
            organization_id: ownership.organization_id,
            created_by: ownership.created_by,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn save(&self, task: &Task) -> Result<Task> {
        match self.tasks.get_mut(&task.id) {
            Some(mut stored) => {
                *stored = task.clone();
                Ok(task.clone())
            }
            None => Err(TaskgateError::not_found("task", task.id)),
        }
    }

    async fn remove(&self, id: i64) -> Result<bool> {
        Ok(self.tasks.remove(&id).is_some())
    }
}

#[async_trait]
impl ResourceStore<User> for MemoryStore {
    async fn list_in(&self, scope: &OrgScope) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|entry| scope.contains(entry.organization_id))
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn get(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn insert(&self, draft: NewUser, ownership: Ownership) -> Result<User> {
        let id = self.claim_email(&draft.email)?;
        let user = User {
            id,
            email: draft.email,
            role: draft.role,
            organization_id: ownership.organization_id,
            created_by: Some(ownership.created_by),
            created_at: Utc::now(),
            password_hash: draft.password_hash,
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<User> {
        match self.users.get_mut(&user.id) {
            Some(mut stored) => {
                *stored = user.clone();
                Ok(user.clone())
            }
            None => Err(TaskgateError::not_found("user", user.id)),
        }
    }

    async fn remove(&self, id: i64) -> Result<bool> {
        match self.users.remove(&id) {
            Some((_, user)) => {
                self.emails.remove(&user.email.to_lowercase());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord> {
        let saved = AuditRecord {
            id: self.audit_seq.fetch_add(1, Ordering::SeqCst) + 1,
            actor_id: record.actor_id,
            action: record.action,
            timestamp: record.timestamp,
        };
        self.audit.write().push(saved.clone());
        Ok(saved)
    }

    async fn list_recent(&self) -> Result<Vec<AuditRecord>> {
        let mut records = self.audit.read().clone();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(records)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rbac::UserId;

    #[tokio::test]
    async fn test_insert_organization_links_parent() {
        let store = MemoryStore::new();
        store.insert_organization(Organization::new(1, "HQ"));
        store.insert_organization(Organization::new(2, "Eng").with_parent(1));
        store.insert_organization(Organization::new(2, "Eng").with_parent(1));

        let hq = store.get_organization(OrganizationId(1)).await.unwrap().unwrap();
        assert_eq!(hq.child_ids, vec![OrganizationId(2)]);
    }

    #[tokio::test]
    async fn test_put_organization_keeps_raw_edges() {
        let store = MemoryStore::new();
        store.put_organization(Organization::new(1, "Loop").with_children([1]));
        let node = store.get_organization(OrganizationId(1)).await.unwrap().unwrap();
        assert_eq!(node.child_ids, vec![OrganizationId(1)]);
        assert!(store.get_organization(OrganizationId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store
            .insert_bootstrap_user(
                "Owner@Example.com",
                String::new(),
                Role::Owner,
                OrganizationId(1),
            )
            .unwrap();

        let draft = NewUser {
            email: "owner@example.com".into(),
            password_hash: String::new(),
            role: Role::Viewer,
        };
        let ownership = Ownership {
            organization_id: OrganizationId(1),
            created_by: UserId(1),
        };
        let err = ResourceStore::<User>::insert(&store, draft, ownership).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);
    }

    #[tokio::test]
    async fn test_task_ids_are_sequential_and_remove_reports() {
        let store = MemoryStore::new();
        let ownership = Ownership {
            organization_id: OrganizationId(1),
            created_by: UserId(1),
        };
        let a = ResourceStore::<Task>::insert(&store, NewTask::titled("a"), ownership)
            .await
            .unwrap();
        let b = ResourceStore::<Task>::insert(&store, NewTask::titled("b"), ownership)
            .await
            .unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        assert!(ResourceStore::<Task>::remove(&store, a.id).await.unwrap());
        assert!(!ResourceStore::<Task>::remove(&store, a.id).await.unwrap());
        assert_eq!(store.task_count(), 1);
    }
}
