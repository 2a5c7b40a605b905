//! Axum authorization middleware that runs the permission gate per route.
//!
//! This middleware reads the [`Identity`] injected by the auth layer, if any,
//! evaluates the route's required actions and, on success, inserts the
//! resulting [`Principal`] for handlers to extract.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

use super::identity::{Identity, Principal};
use super::models::Action;
use super::policy::PermissionGate;
use crate::error::TaskgateError;

// ═══════════════════════════════════════════════════════════════════════════════
// Principal Extractor
// ═══════════════════════════════════════════════════════════════════════════════

/// Handlers extract the gate-approved principal directly.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().copied().ok_or_else(|| {
            TaskgateError::internal("Principal requested on a route without RequirePermissionLayer")
                .into_response()
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that wraps services with the permission gate.
///
/// # Example
///
/// ```rust,ignore
/// use taskgate_core::rbac::{Action, RequirePermissionLayer};
///
/// let app = Router::new()
///     .route("/api/tasks", post(create_task))
///     .route_layer(RequirePermissionLayer::new([Action::CreateTask]));
/// ```
#[derive(Clone)]
pub struct RequirePermissionLayer {
    gate: PermissionGate,
    required: Arc<[Action]>,
}

impl RequirePermissionLayer {
    /// Require at least one of `actions`.
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            gate: PermissionGate::new(),
            required: actions.into_iter().collect(),
        }
    }

    pub fn required(&self) -> &[Action] {
        &self.required
    }
}

impl<S> Layer<S> for RequirePermissionLayer {
    type Service = RequirePermissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionService {
            inner,
            gate: self.gate,
            required: self.required.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Service that enforces the required actions per request.
#[derive(Clone)]
pub struct RequirePermissionService<S> {
    inner: S,
    gate: PermissionGate,
    required: Arc<[Action]>,
}

impl<S> Service<Request<Body>> for RequirePermissionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let gate = self.gate;
        let required = self.required.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let identity = request.extensions().get::<Identity>().cloned();

            match gate.enforce(identity.as_ref(), &required) {
                Ok(principal) => {
                    request.extensions_mut().insert(principal);
                    inner.call(request).await
                }
                Err(reason) => {
                    warn!(
                        user_id = ?identity.as_ref().map(|i| i.user_id),
                        path = %request.uri().path(),
                        reason = %reason,
                        "Permission denied"
                    );
                    Ok(TaskgateError::from(reason).into_response())
                }
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
