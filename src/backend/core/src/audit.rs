//! Audit trail for state-changing operations and privileged reads.
//!
//! Writes are best-effort: a failing sink is logged and counted, never
//! reported to the caller. Reads return the global log, newest first, and are
//! restricted to hierarchy-privileged roles holding `view_audit_log`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::Result;
use crate::rbac::{has_permission, Action, PolicyError, Principal, UserId};

/// One append-only entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: i64,
    pub actor_id: UserId,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// An entry not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditRecord {
    pub actor_id: UserId,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// Storage for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord>;

    /// All records, newest first.
    async fn list_recent(&self) -> Result<Vec<AuditRecord>>;
}

/// Records audit entries and serves the audit log.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Append an entry stamped with the current time. Never fails.
    pub async fn record(&self, actor_id: UserId, action: impl Into<String>) {
        let entry = NewAuditRecord {
            actor_id,
            action: action.into(),
            timestamp: Utc::now(),
        };

        match self.sink.append(entry).await {
            Ok(saved) => {
                debug!(
                    audit_id = saved.id,
                    actor_id = %actor_id,
                    action = %saved.action,
                    "Audit entry recorded"
                );
            }
            Err(err) => {
                counter!("taskgate_audit_write_failures_total").increment(1);
                error!(actor_id = %actor_id, error = %err, "Failed to record audit entry");
            }
        }
    }

    /// The full audit log, newest first.
    ///
    /// The read itself is recorded once the log has been fetched.
    pub async fn list_all(&self, principal: &Principal) -> Result<Vec<AuditRecord>> {
        if !has_permission(principal.role(), Action::ViewAuditLog) {
            return Err(PolicyError::InsufficientPermission.into());
        }
        if !principal.role().is_hierarchy_privileged() {
            return Err(PolicyError::InsufficientPermission.into());
        }

        let mut records = self.sink.list_recent().await?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        self.record(principal.user_id(), "Viewed audit log").await;
        Ok(records)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::{ErrorCode, TaskgateError};
    use crate::rbac::{Identity, PermissionGate, Role};

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn append(&self, _record: NewAuditRecord) -> Result<AuditRecord> {
            Err(TaskgateError::new(ErrorCode::DatabaseQueryFailed, "audit table locked"))
        }

        async fn list_recent(&self) -> Result<Vec<AuditRecord>> {
            Ok(Vec::new())
        }
    }

    fn principal(role: Role) -> Principal {
        PermissionGate::new()
            .enforce(Some(&Identity::with_role(1, role, 1)), &[])
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_swallows_sink_failures() {
        let recorder = AuditRecorder::new(Arc::new(BrokenSink));
        recorder.record(UserId(1), "Deleted task ID: 3").await;
    }

    #[tokio::test]
    async fn test_list_all_is_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());
        recorder.record(UserId(1), "first").await;
        recorder.record(UserId(2), "second").await;

        let log = recorder.list_all(&principal(Role::Owner)).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].action, "second");
        assert_eq!(log[1].action, "first");
        assert!(log[0].timestamp >= log[1].timestamp);
    }

    #[tokio::test]
    async fn test_list_all_records_the_read() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());
        recorder.list_all(&principal(Role::Admin)).await.unwrap();

        let log = store.list_recent().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "Viewed audit log");
    }

    #[tokio::test]
    async fn test_viewer_cannot_read_audit_log() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());
        let err = recorder.list_all(&principal(Role::Viewer)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientPermission);
        assert!(store.list_recent().await.unwrap().is_empty());
    }
}
