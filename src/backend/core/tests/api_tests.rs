//! End-to-end tests for the HTTP surface.
//!
//! Tests cover:
//! - Public endpoints
//! - Missing, malformed and expired credentials
//! - Per-route permission checks
//! - Task CRUD through the router
//! - Error envelope shape

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use taskgate_core::api::{build_router, AppState};
use taskgate_core::config::AuthConfig;
use taskgate_core::db::MemoryStore;
use taskgate_core::middleware::{Authenticator, TokenClaims};
use taskgate_core::rbac::{Identity, Organization, OrganizationId, Role, UserId};
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret-that-is-long-enough";

struct Harness {
    app: Router,
    auth: Arc<Authenticator>,
    owner: Identity,
    viewer: Identity,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.insert_organization(Organization::new(1, "HQ"));
        store.insert_organization(Organization::new(2, "Engineering").with_parent(1));

        let owner = store
            .insert_bootstrap_user(
                "owner@example.com",
                String::new(),
                Role::Owner,
                OrganizationId(1),
            )
            .unwrap();
        let viewer = store
            .insert_bootstrap_user(
                "viewer@example.com",
                String::new(),
                Role::Viewer,
                OrganizationId(1),
            )
            .unwrap();

        let auth = Arc::new(Authenticator::new(&AuthConfig::new(SECRET)).unwrap());
        let app = build_router(AppState::new(store), auth.clone());

        Self {
            app,
            auth,
            owner: Identity::with_role(UserId(owner.id), Role::Owner, 1),
            viewer: Identity::with_role(UserId(viewer.id), Role::Viewer, 1),
        }
    }

    fn token(&self, identity: &Identity) -> String {
        self.auth.generate_token(identity).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

// ============================================================================
// Public endpoints
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let h = Harness::new();
    let (status, body) = h.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_metrics_is_public() {
    let h = Harness::new();
    let (status, _) = h.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_missing_token_is_unauthenticated() {
    let h = Harness::new();
    let (status, body) = h.send(Method::GET, "/api/tasks", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let h = Harness::new();
    let (status, _) = h.send(Method::GET, "/api/tasks", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let h = Harness::new();
    let mut claims = TokenClaims::for_identity(&h.owner, std::time::Duration::from_secs(60));
    claims.iat -= 7_200;
    claims.exp = claims.iat + 60;
    let token = h.auth.sign(&claims).unwrap();

    let (status, _) = h.send(Method::GET, "/api/tasks", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_role_is_forbidden() {
    let h = Harness::new();
    let identity = Identity::new(UserId(99), 42, 1);
    let token = h.token(&identity);

    let (status, body) = h.send(Method::GET, "/api/tasks", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NO_ROLE_ASSIGNED");
}

#[tokio::test]
async fn test_token_without_role_claim_is_forbidden() {
    let h = Harness::new();
    let mut claims = TokenClaims::for_identity(&h.owner, std::time::Duration::from_secs(600));
    claims.role_id = None;
    let token = h.auth.sign(&claims).unwrap();

    let (status, body) = h.send(Method::GET, "/api/tasks", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NO_ROLE_ASSIGNED");
}

// ============================================================================
// Permissions
// ============================================================================

#[tokio::test]
async fn test_viewer_cannot_create_task() {
    let h = Harness::new();
    let token = h.token(&h.viewer);

    let (status, body) = h
        .send(Method::POST, "/api/tasks", Some(&token), Some(json!({ "title": "nope" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSION");
}

#[tokio::test]
async fn test_viewer_cannot_read_audit_log() {
    let h = Harness::new();
    let token = h.token(&h.viewer);

    let (status, _) = h.send(Method::GET, "/api/audit-log", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Task CRUD
// ============================================================================

#[tokio::test]
async fn test_task_lifecycle() {
    let h = Harness::new();
    let owner = h.token(&h.owner);
    let viewer = h.token(&h.viewer);

    let (status, body) = h
        .send(
            Method::POST,
            "/api/tasks",
            Some(&owner),
            Some(json!({ "title": "Write report", "organizationId": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["organizationId"], 1);
    assert_eq!(body["data"]["category"], "Work");
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = h.send(Method::GET, "/api/tasks", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let uri = format!("/api/tasks/{id}");
    let (status, body) = h
        .send(Method::PUT, &uri, Some(&owner), Some(json!({ "status": "In Progress" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "In Progress");

    let (status, _) = h.send(Method::DELETE, &uri, Some(&viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.send(Method::DELETE, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    let (status, body) = h.send(Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = h.send(Method::GET, "/api/audit-log", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["action"].as_str())
        .collect();
    assert!(actions.contains(&"Created task: Write report"));
    assert!(actions.contains(&format!("Deleted task ID: {id}").as_str()));
}

#[tokio::test]
async fn test_invalid_json_body() {
    let h = Harness::new();
    let owner = h.token(&h.owner);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/tasks")
        .header(header::AUTHORIZATION, format!("Bearer {owner}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blank_title_is_validation_error() {
    let h = Harness::new();
    let owner = h.token(&h.owner);

    let (status, body) = h
        .send(Method::POST, "/api/tasks", Some(&owner), Some(json!({ "title": "   " })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn test_owner_creates_user_without_password_in_response() {
    let h = Harness::new();
    let owner = h.token(&h.owner);

    let (status, body) = h
        .send(
            Method::POST,
            "/api/users",
            Some(&owner),
            Some(json!({ "email": "new@example.com", "password": "password123", "roleId": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["email"], "new@example.com");
    assert_eq!(body["data"]["roleId"], 3);
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("password_hash").is_none());

    let (status, body) = h.send(Method::GET, "/api/users", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}
