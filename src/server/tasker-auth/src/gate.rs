//! Authorization gate for protected operations.

use std::sync::Arc;

use tracing::debug;

use crate::{AuthBackend, AuthContext, AuthError};

/// Extracts the token from an `Authorization` header value.
///
/// Accepts `Bearer <token>` with a case-insensitive scheme. Returns `None`
/// for any other scheme or an empty token.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Checks the bearer credential of a request before any protected operation
/// runs.
#[derive(Clone)]
pub struct AuthorizationGate {
    backend: Arc<dyn AuthBackend>,
}

impl AuthorizationGate {
    /// Creates a gate validating tokens with `backend`.
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        Self { backend }
    }

    /// Authorizes a request from its raw `Authorization` header.
    ///
    /// # Errors
    ///
    /// * [`AuthError::MissingToken`] - no header
    /// * [`AuthError::TokenInvalid`] - not a bearer credential, or bad token
    /// * [`AuthError::TokenExpired`] - token past its expiry
    pub async fn authorize(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError> {
        let header = authorization.ok_or(AuthError::MissingToken)?;
        let token = bearer_token(header).ok_or(AuthError::TokenInvalid)?;

        let result = self.backend.validate(token).await;
        if let Err(ref e) = result {
            debug!(backend = self.backend.name(), error = %e, "Authorization rejected");
        }

        result
    }
}
