//! REST API for Taskgate Core.
//!
//! Every protected route carries its own [`RequirePermissionLayer`], so the
//! permission gate runs before the handler and handlers receive a
//! [`Principal`](crate::rbac::Principal) instead of raw token claims.
//!
//! | Method | Path                | Required action   |
//! |--------|---------------------|-------------------|
//! | GET    | `/api/tasks`        | `view_task`       |
//! | GET    | `/api/tasks/:id`    | `view_task`       |
//! | POST   | `/api/tasks`        | `create_task`     |
//! | PUT    | `/api/tasks/:id`    | `update_task`     |
//! | DELETE | `/api/tasks/:id`    | `delete_task`     |
//! | GET    | `/api/users`        | `view_user`       |
//! | POST   | `/api/users`        | `create_user`     |
//! | GET    | `/api/audit-log`    | `view_audit_log`  |
//!
//! `/health` and `/metrics` are public.

mod handlers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::audit::AuditRecorder;
use crate::db::Store;
use crate::middleware::{AuthLayer, Authenticator};
use crate::rbac::{AccessEngine, Action, HierarchyResolver, RequirePermissionLayer};
use crate::tasks::TaskService;
use crate::users::UserService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskService,
    pub users: UserService,
    pub audit: AuditRecorder,
    pub store: Arc<dyn Store>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire services over a single backing store.
    pub fn new<S: Store>(store: Arc<S>) -> Self {
        let audit = AuditRecorder::new(store.clone());
        let engine = AccessEngine::new(HierarchyResolver::new(store.clone()), audit.clone());

        Self {
            tasks: TaskService::new(store.clone(), engine.clone()),
            users: UserService::new(store.clone(), engine),
            audit,
            store,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

/// Standard success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data }
    }
}

/// A route group guarded by one set of required actions.
fn guarded(
    router: Router<AppState>,
    actions: impl IntoIterator<Item = Action>,
) -> Router<AppState> {
    router.route_layer(RequirePermissionLayer::new(actions))
}

/// Build the API router.
///
/// ```rust,ignore
/// let state = AppState::new(store);
/// let app = build_router(state, Arc::new(Authenticator::new(&config.auth)?));
/// ```
pub fn build_router(state: AppState, authenticator: Arc<Authenticator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let view_tasks = guarded(
        Router::new()
            .route("/api/tasks", get(handlers::list_tasks))
            .route("/api/tasks/:id", get(handlers::get_task)),
        [Action::ViewTask],
    );
    let create_tasks = guarded(
        Router::new().route("/api/tasks", post(handlers::create_task)),
        [Action::CreateTask],
    );
    let update_tasks = guarded(
        Router::new().route("/api/tasks/:id", put(handlers::update_task)),
        [Action::UpdateTask],
    );
    let delete_tasks = guarded(
        Router::new().route("/api/tasks/:id", delete(handlers::delete_task)),
        [Action::DeleteTask],
    );
    let view_users = guarded(
        Router::new().route("/api/users", get(handlers::list_users)),
        [Action::ViewUser],
    );
    let create_users = guarded(
        Router::new().route("/api/users", post(handlers::create_user)),
        [Action::CreateUser],
    );
    let view_audit = guarded(
        Router::new().route("/api/audit-log", get(handlers::list_audit_log)),
        [Action::ViewAuditLog],
    );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .merge(view_tasks)
        .merge(create_tasks)
        .merge(update_tasks)
        .merge(delete_tasks)
        .merge(view_users)
        .merge(create_users)
        .merge(view_audit)
        .layer(AuthLayer::new(authenticator))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
