//! Organization hierarchy resolution.
//!
//! Given a root organization and a role, computes the set of organization ids
//! whose resources the role may observe. Subtree roles walk the tree
//! breadth-first; every other role gets its own organization only.
//!
//! Tree data comes from persistence and is not trusted: cycles, self-loops and
//! dangling child ids all terminate with a finite, duplicate-free scope that
//! never reaches beyond what the stored edges describe.

use async_trait::async_trait;
use metrics::counter;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::models::{HierarchyScope, Organization, OrganizationId, Role};
use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// Directory Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access to the organization tree.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    /// Fetch one node. `Ok(None)` means no such organization.
    async fn get_organization(&self, id: OrganizationId) -> Result<Option<Organization>>;
}

#[async_trait]
impl<T: OrganizationDirectory + ?Sized> OrganizationDirectory for Arc<T> {
    async fn get_organization(&self, id: OrganizationId) -> Result<Option<Organization>> {
        (**self).get_organization(id).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scope
// ═══════════════════════════════════════════════════════════════════════════════

/// The set of organizations visible to one caller.
///
/// Iteration order is unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgScope {
    root: OrganizationId,
    members: HashSet<OrganizationId>,
}

impl OrgScope {
    /// A scope containing only `root`.
    pub fn single(root: OrganizationId) -> Self {
        Self {
            root,
            members: HashSet::from([root]),
        }
    }

    pub fn root(&self) -> OrganizationId {
        self.root
    }

    pub fn contains(&self, id: OrganizationId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = OrganizationId> + '_ {
        self.members.iter().copied()
    }

    /// Raw ids, for `= ANY($1)` style queries.
    pub fn ids(&self) -> Vec<i64> {
        self.members.iter().map(|id| id.get()).collect()
    }

    fn insert(&mut self, id: OrganizationId) -> bool {
        self.members.insert(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolver
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes [`OrgScope`]s from an [`OrganizationDirectory`].
#[derive(Clone)]
pub struct HierarchyResolver {
    directory: Arc<dyn OrganizationDirectory>,
}

impl HierarchyResolver {
    pub fn new(directory: Arc<dyn OrganizationDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve the visible scope for `role` rooted at `root`.
    ///
    /// Persistence errors propagate. A missing root yields `{root}`.
    #[instrument(skip(self), fields(root = %root, role = %role))]
    pub async fn resolve_scope(&self, root: OrganizationId, role: Role) -> Result<OrgScope> {
        let scope = match role.hierarchy_scope() {
            HierarchyScope::OwnOrganization => OrgScope::single(root),
            HierarchyScope::Subtree => self.walk_subtree(root).await?,
        };

        counter!(
            "taskgate_scope_resolutions_total",
            "role" => role.name(),
        )
        .increment(1);

        debug!(size = scope.len(), "Resolved organization scope");
        Ok(scope)
    }

    async fn walk_subtree(&self, root: OrganizationId) -> Result<OrgScope> {
        let mut scope = OrgScope::single(root);
        let mut queue = VecDeque::from([root]);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.directory.get_organization(current).await? else {
                if current != root {
                    warn!(org_id = %current, "Child organization has no stored node");
                }
                continue;
            };

            for child in node.child_ids {
                if scope.insert(child) {
                    queue.push_back(child);
                } else {
                    debug!(org_id = %child, parent = %current, "Skipping revisited organization");
                }
            }
        }

        Ok(scope)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskgateError;
    use std::collections::HashMap;

    struct FixedTree(HashMap<OrganizationId, Organization>);

    impl FixedTree {
        fn new(nodes: Vec<Organization>) -> Arc<Self> {
            Arc::new(Self(nodes.into_iter().map(|o| (o.id, o)).collect()))
        }
    }

    #[async_trait]
    impl OrganizationDirectory for FixedTree {
        async fn get_organization(&self, id: OrganizationId) -> Result<Option<Organization>> {
            Ok(self.0.get(&id).cloned())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl OrganizationDirectory for Unavailable {
        async fn get_organization(&self, _id: OrganizationId) -> Result<Option<Organization>> {
            Err(TaskgateError::new(
                crate::error::ErrorCode::DatabaseConnectionFailed,
                "down",
            ))
        }
    }

    fn sample_tree() -> Arc<FixedTree> {
        FixedTree::new(vec![
            Organization::new(1, "HQ").with_children([2, 3]),
            Organization::new(2, "Eng").with_parent(1).with_children([4]),
            Organization::new(3, "Sales").with_parent(1),
            Organization::new(4, "Platform").with_parent(2),
        ])
    }

    fn ids(scope: &OrgScope) -> HashSet<i64> {
        scope.iter().map(|id| id.get()).collect()
    }

    #[tokio::test]
    async fn test_owner_sees_whole_subtree() {
        let resolver = HierarchyResolver::new(sample_tree());
        let scope = resolver.resolve_scope(OrganizationId(1), Role::Owner).await.unwrap();
        assert_eq!(ids(&scope), HashSet::from([1, 2, 3, 4]));

        let scope = resolver.resolve_scope(OrganizationId(2), Role::Owner).await.unwrap();
        assert_eq!(ids(&scope), HashSet::from([2, 4]));
    }

    #[tokio::test]
    async fn test_admin_and_viewer_see_own_org() {
        let resolver = HierarchyResolver::new(sample_tree());
        for role in [Role::Admin, Role::Viewer] {
            let scope = resolver.resolve_scope(OrganizationId(1), role).await.unwrap();
            assert_eq!(ids(&scope), HashSet::from([1]));
        }
    }

    #[tokio::test]
    async fn test_missing_root_is_singleton() {
        let resolver = HierarchyResolver::new(sample_tree());
        let scope = resolver.resolve_scope(OrganizationId(99), Role::Owner).await.unwrap();
        assert_eq!(ids(&scope), HashSet::from([99]));
        assert_eq!(scope.root(), OrganizationId(99));
    }

    #[tokio::test]
    async fn test_self_cycle_terminates() {
        let tree = FixedTree::new(vec![
            Organization::new(1, "Loop").with_children([1, 2]),
            Organization::new(2, "Leaf"),
        ]);
        let resolver = HierarchyResolver::new(tree);
        let scope = resolver.resolve_scope(OrganizationId(1), Role::Owner).await.unwrap();
        assert_eq!(ids(&scope), HashSet::from([1, 2]));
        assert_eq!(scope.len(), 2);
    }

    #[tokio::test]
    async fn test_longer_cycle_terminates() {
        let tree = FixedTree::new(vec![
            Organization::new(1, "A").with_children([2]),
            Organization::new(2, "B").with_children([3]),
            Organization::new(3, "C").with_children([1]),
        ]);
        let resolver = HierarchyResolver::new(tree);
        let scope = resolver.resolve_scope(OrganizationId(2), Role::Owner).await.unwrap();
        assert_eq!(ids(&scope), HashSet::from([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_dangling_child_is_kept_as_leaf() {
        let tree = FixedTree::new(vec![Organization::new(1, "HQ").with_children([7])]);
        let resolver = HierarchyResolver::new(tree);
        let scope = resolver.resolve_scope(OrganizationId(1), Role::Owner).await.unwrap();
        assert_eq!(ids(&scope), HashSet::from([1, 7]));
    }

    #[tokio::test]
    async fn test_persistence_failure_propagates_for_subtree_roles() {
        let resolver = HierarchyResolver::new(Arc::new(Unavailable));
        assert!(resolver.resolve_scope(OrganizationId(1), Role::Owner).await.is_err());
        // Own-org roles never touch the directory.
        assert!(resolver.resolve_scope(OrganizationId(1), Role::Admin).await.is_ok());
    }

    #[test]
    fn test_scope_ids() {
        let scope = OrgScope::single(OrganizationId(5));
        assert_eq!(scope.ids(), vec![5]);
        assert!(scope.contains(OrganizationId(5)));
        assert!(!scope.contains(OrganizationId(6)));
        assert!(!scope.is_empty());
    }
}
