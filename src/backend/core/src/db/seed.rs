//! Demo data for `--in-memory` runs.
//!
//! Builds `Headquarters(1) → [Engineering(2), Sales(3)]`,
//! `Engineering → [Platform(4)]`, an Owner and a Viewer in Headquarters, and
//! one task for each seeded user whose role may create tasks.

use tracing::info;

use super::MemoryStore;
use crate::error::Result;
use crate::rbac::{
    has_permission, Action, Organization, OrganizationId, Ownership, ResourceStore, Role,
    ScopedResource,
};
use crate::tasks::{NewTask, Task};
use crate::users::{hash_password, User};

/// Password given to every seeded account.
pub const SEED_PASSWORD: &str = "password123";

/// What [`seed_demo_data`] created.
#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub users: Vec<User>,
    pub tasks: Vec<Task>,
}

/// Populate `store` with the demo tree, accounts and tasks.
pub async fn seed_demo_data(store: &MemoryStore) -> Result<SeedSummary> {
    store.insert_organization(Organization::new(1, "Headquarters"));
    store.insert_organization(Organization::new(2, "Engineering").with_parent(1));
    store.insert_organization(Organization::new(3, "Sales").with_parent(1));
    store.insert_organization(Organization::new(4, "Platform").with_parent(2));

    let accounts = [
        ("testuser_owner@example.com", Role::Owner),
        ("testuser_viewer@example.com", Role::Viewer),
    ];

    let mut summary = SeedSummary {
        users: Vec::with_capacity(accounts.len()),
        tasks: Vec::new(),
    };

    for (email, role) in accounts {
        let hash = hash_password(SEED_PASSWORD.to_string()).await?;
        let user = store.insert_bootstrap_user(email, hash, role, OrganizationId(1))?;
        info!(email, role = %role, "Seeded user");

        if has_permission(role, Action::CreateTask) {
            let mut draft = NewTask::titled(format!("Task for {email}"));
            draft.description = "This is a seeded task.".to_string();

            let ownership = Ownership {
                organization_id: user.organization_id,
                created_by: user.created_by(),
            };
            let task = ResourceStore::<Task>::insert(store, draft, ownership).await?;
            info!(email, task_id = task.id, "Seeded task");
            summary.tasks.push(task);
        } else {
            info!(email, "Role cannot create tasks, skipping seeded task");
        }

        summary.users.push(user);
    }

    Ok(summary)
}
