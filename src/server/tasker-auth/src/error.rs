//! Authentication error types.

use tasker_crypto::CryptoError;
use tasker_storage::StorageError;
use thiserror::Error;

/// Errors that can occur during authentication.
///
/// Display texts are safe to show to clients except for the detail carried
/// by the federation variants, which is meant for logs.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username is already registered.
    #[error("user already exists")]
    DuplicateUser,

    /// Unknown user or wrong password. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The provider callback carried no authorization code.
    #[error("authorization code missing")]
    MissingAuthorizationCode,

    /// The code could not be exchanged for an identity token.
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// The identity token failed verification.
    #[error("invalid identity token: {0}")]
    InvalidIdentityToken(String),

    /// Access token has expired.
    #[error("token expired")]
    TokenExpired,

    /// Access token is malformed, badly signed or missing claims.
    #[error("invalid token")]
    TokenInvalid,

    /// Missing authentication token.
    #[error("missing authentication token")]
    MissingToken,

    /// Empty or malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Backend configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Password hashing error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}
