//! HTTP middleware for Taskgate Core.
pub mod auth;

pub use auth::{AuthError, AuthLayer, AuthService, Authenticator, TokenClaims};
