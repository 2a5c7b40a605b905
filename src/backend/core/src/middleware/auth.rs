//! Bearer token authentication.
//!
//! Features:
//! - HMAC JWT validation with configurable issuer and leeway
//! - Typed claim decoding into an [`Identity`] at the trust boundary
//! - Public path bypass for health and metrics
//! - Token minting for tooling and tests
//!
//! A request without an `Authorization` header passes through with no
//! identity attached; the permission gate then rejects it on any route that
//! requires an action. A header that is present but invalid is rejected here.
//!
//! # Example
//!
//! ```rust,ignore
//! use taskgate_core::middleware::auth::{AuthLayer, Authenticator};
//!
//! let authenticator = Arc::new(Authenticator::new(&config.auth)?);
//!
//! let app = Router::new()
//!     .route("/api/tasks", get(list_tasks))
//!     .layer(AuthLayer::new(authenticator));
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use futures::future::BoxFuture;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use metrics::counter;
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::{debug, Instrument};

use crate::config::AuthConfig;
use crate::rbac::{Identity, OrganizationId, UserId};

const ALGORITHM: Algorithm = Algorithm::HS256;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Malformed token claims: {0}")]
    MalformedClaims(String),

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::MalformedClaims(_) => "MALFORMED_CLAIMS",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "The provided token is invalid"),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "The authentication token has expired",
            ),
            Self::MalformedClaims(_) => (
                StatusCode::UNAUTHORIZED,
                "The token does not carry a valid identity",
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An authentication error occurred",
            ),
        };
        let code = self.code();

        counter!(
            "auth_errors_total",
            "error_type" => code
        )
        .increment(1);

        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JWT Claims
// ═══════════════════════════════════════════════════════════════════════════════

/// The claim set carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// User id. Accepted as a JSON number or a numeric string.
    #[serde(deserialize_with = "deserialize_subject")]
    pub sub: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Absent for accounts with no role; the gate answers those with 403.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i64>,

    pub organization_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    pub iat: i64,

    pub exp: i64,
}

impl TokenClaims {
    /// Claims for `identity`, valid for `ttl` from now.
    pub fn for_identity(identity: &Identity, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: identity.user_id.get(),
            email: identity.email.clone(),
            role_id: identity.role_id,
            organization_id: identity.organization_id.get(),
            iss: None,
            iat: now,
            exp: now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        }
    }

    /// The typed identity these claims describe.
    ///
    /// The role id is carried through untouched; a missing or unknown id is
    /// rejected later by the gate as "no role".
    pub fn into_identity(self) -> Identity {
        Identity {
            user_id: UserId(self.sub),
            email: self.email,
            role_id: self.role_id,
            organization_id: OrganizationId(self.organization_id),
        }
    }
}

fn deserialize_subject<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Subject {
        Number(i64),
        Text(String),
    }

    match Subject::deserialize(deserializer)? {
        Subject::Number(n) => Ok(n),
        Subject::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("subject is not a user id: {s:?}"))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authenticator
// ═══════════════════════════════════════════════════════════════════════════════

/// Validates bearer tokens and mints new ones.
pub struct Authenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
    token_ttl: Duration,
    public_paths: Vec<String>,
}

impl Authenticator {
    /// Create a new authenticator.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::Internal("JWT secret required for HMAC algorithms".into()));
        }
        let secret = config.jwt_secret.as_bytes();

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = config.leeway_secs;
        if let Some(ref issuer) = config.issuer {
            // `iss` is only compared when present unless it is also required.
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            token_ttl: config.token_ttl,
            public_paths: vec!["/health".to_string(), "/metrics".to_string()],
        })
    }

    /// Add a path that skips authentication entirely. A trailing `*` matches a prefix.
    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }

    /// Check if a path is public (doesn't require auth).
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| match p.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == p,
        })
    }

    /// Authenticate a request's headers.
    ///
    /// `Ok(None)` means no credentials were presented.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(None);
        };

        let token = value
            .to_str()
            .ok()
            .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidToken)?;

        self.validate(token).map(Some)
    }

    /// Validate a raw JWT and decode its identity.
    pub fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("JWT validation failed: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                    AuthError::MalformedClaims(e.to_string())
                }
                _ => AuthError::InvalidToken,
            }
        })?;

        counter!("auth_success_total", "method" => "jwt").increment(1);
        Ok(data.claims.into_identity())
    }

    /// Sign a token for `identity` using the configured lifetime.
    pub fn generate_token(&self, identity: &Identity) -> Result<String, AuthError> {
        let mut claims = TokenClaims::for_identity(identity, self.token_ttl);
        claims.iss = self.issuer.clone();
        self.sign(&claims)
    }

    /// Sign arbitrary claims.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to generate token: {}", e)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication layer for Tower.
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<Authenticator>,
}

impl AuthLayer {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
}

impl<S> Service<Request<Body>> for AuthService<S>
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
        let authenticator = self.authenticator.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if authenticator.is_public_path(request.uri().path()) {
                return inner.call(request).await;
            }

            match authenticator.authenticate(request.headers()) {
                Ok(Some(identity)) => {
                    let span = tracing::debug_span!(
                        "identity",
                        user_id = %identity.user_id,
                        org_id = %identity.organization_id,
                        role_id = ?identity.role_id,
                    );
                    request.extensions_mut().insert(identity);
                    inner.call(request).instrument(span).await
                }
                Ok(None) => inner.call(request).await,
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Role;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-test-secret-test-secret";

    fn authenticator() -> Authenticator {
        Authenticator::new(&AuthConfig::new(SECRET)).unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_token_round_trip_preserves_identity() {
        let auth = authenticator();
        let identity = Identity::with_role(7, Role::Admin, 2).with_email("admin@example.com");
        let token = auth.generate_token(&identity).unwrap();

        let decoded = auth.authenticate(&bearer(&token)).unwrap().unwrap();
        assert_eq!(decoded, identity);
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        assert!(authenticator().authenticate(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn test_non_bearer_header_is_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(
            authenticator().authenticate(&headers),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let other =
            Authenticator::new(&AuthConfig::new("another-secret-another-secret-xx")).unwrap();
        let token = other
            .generate_token(&Identity::with_role(1, Role::Owner, 1))
            .unwrap();
        assert!(matches!(
            authenticator().validate(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token() {
        let auth = authenticator();
        let owner = Identity::with_role(1, Role::Owner, 1);
        let mut claims = TokenClaims::for_identity(&owner, Duration::ZERO);
        claims.iat -= 7200;
        claims.exp -= 3600;
        let token = auth.sign(&claims).unwrap();
        assert!(matches!(auth.validate(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_string_subject_is_accepted() {
        let claims: TokenClaims = serde_json::from_value(serde_json::json!({
            "sub": "42", "roleId": 3, "organizationId": 1, "iat": 0, "exp": 1
        }))
        .unwrap();
        assert_eq!(claims.sub, 42);

        let bad = serde_json::from_value::<TokenClaims>(serde_json::json!({
            "sub": "alice", "roleId": 3, "organizationId": 1, "iat": 0, "exp": 1
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_unknown_role_survives_decoding() {
        let auth = authenticator();
        let token = auth.generate_token(&Identity::new(3, 77, 1)).unwrap();
        let identity = auth.validate(&token).unwrap();
        assert_eq!(identity.role_id, Some(77));
        assert_eq!(identity.role(), None);
    }

    #[test]
    fn test_missing_role_claim_decodes_without_role() {
        let auth = authenticator();
        let now = Utc::now().timestamp();
        let token = auth
            .sign(&TokenClaims {
                sub: 5,
                email: None,
                role_id: None,
                organization_id: 1,
                iss: None,
                iat: now,
                exp: now + 600,
            })
            .unwrap();

        let identity = auth.validate(&token).unwrap();
        assert_eq!(identity.role_id, None);
        assert_eq!(identity.role(), None);
    }

    #[test]
    fn test_issuer_is_enforced() {
        let mut config = AuthConfig::new(SECRET);
        config.issuer = Some("taskgate".into());
        let strict = Authenticator::new(&config).unwrap();

        let unsigned_issuer = authenticator()
            .generate_token(&Identity::with_role(1, Role::Owner, 1))
            .unwrap();
        assert!(strict.validate(&unsigned_issuer).is_err());

        let good = strict
            .generate_token(&Identity::with_role(1, Role::Owner, 1))
            .unwrap();
        assert!(strict.validate(&good).is_ok());
    }

    #[test]
    fn test_public_paths() {
        let auth = authenticator().with_public_path("/docs/*");
        assert!(auth.is_public_path("/health"));
        assert!(auth.is_public_path("/metrics"));
        assert!(auth.is_public_path("/docs/openapi.json"));
        assert!(!auth.is_public_path("/api/tasks"));
    }
}
