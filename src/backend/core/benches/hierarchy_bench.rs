//! Benchmarks for organization scope resolution and the permission gate.
use std::sync::Arc;

use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput,
};
use taskgate_core::db::MemoryStore;
use taskgate_core::rbac::{
    Action, HierarchyResolver, Identity, Organization, OrganizationId, PermissionGate, Role,
    UserId,
};

/// A complete tree: `fanout` children per node, `depth` levels below the root.
fn build_tree(fanout: i64, depth: u32) -> (Arc<MemoryStore>, usize) {
    let store = Arc::new(MemoryStore::new());
    store.insert_organization(Organization::new(1, "root"));
    let mut frontier = vec![1_i64];
    let mut next_id = 2_i64;
    for _ in 0..depth {
        let mut next = Vec::with_capacity(frontier.len() * fanout as usize);
        for parent in frontier {
            for _ in 0..fanout {
                let org = Organization::new(next_id, format!("org-{next_id}")).with_parent(parent);
                store.insert_organization(org);
                next.push(next_id);
                next_id += 1;
            }
        }
        frontier = next;
    }
    (store, (next_id - 1) as usize)
}

fn bench_scope_resolution(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("scope_resolution");
    for (fanout, depth) in [(2_i64, 4_u32), (4, 4), (8, 3)] {
        let (store, size) = build_tree(fanout, depth);
        let resolver = HierarchyResolver::new(store);
        group.throughput(Throughput::Elements(size as u64));
        for (label, role) in [("owner_subtree", Role::Owner), ("admin_single", Role::Admin)] {
            group.bench_with_input(BenchmarkId::new(label, size), &resolver, |b, resolver| {
                b.to_async(&runtime).iter(|| async {
                    let scope = resolver.resolve_scope(OrganizationId(1), role).await;
                    black_box(scope.unwrap())
                });
            });
        }
    }
    group.finish();
}

fn bench_permission_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("permission_gate");
    let gate = PermissionGate::new();
    for role in Role::all() {
        let identity = Identity::with_role(UserId(1), role, 1);
        let required = [Action::DeleteTask, Action::ViewTask];
        let id = BenchmarkId::from_parameter(role.name());
        group.bench_with_input(id, &identity, |b, identity| {
            b.iter(|| black_box(gate.authorize(Some(identity), &required)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scope_resolution, bench_permission_gate);
criterion_main!(benches);
