//! Authentication backend trait.

use async_trait::async_trait;

use crate::{AuthContext, AuthError};

/// Trait for authentication backends.
///
/// Implementations validate a bearer token and return an [`AuthContext`]
/// on success.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Validates the given token and returns the authentication context.
    ///
    /// # Returns
    ///
    /// * `Ok(AuthContext)` - If the token is valid
    /// * `Err(AuthError::TokenExpired)` - If the token is past its expiry
    /// * `Err(AuthError::TokenInvalid)` - For any other validation failure
    async fn validate(&self, token: &str) -> Result<AuthContext, AuthError>;

    /// Returns the name of this backend for logging/debugging.
    fn name(&self) -> &'static str;
}
