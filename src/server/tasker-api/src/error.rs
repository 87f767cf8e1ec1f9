//! API error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tasker_auth::AuthError;
use tasker_storage::StorageError;
use thiserror::Error;
use tracing::error;

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication or authorization failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The record does not exist or belongs to someone else.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed request input.
    #[error("{0}")]
    Validation(String),

    /// Federated login is not configured on this server.
    #[error("federated login is not enabled")]
    FederationDisabled,

    /// Anything the client cannot act on.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self::Auth(AuthError::Storage(e))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl ApiError {
    /// HTTP status and stable error code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Auth(e) => match e {
                AuthError::DuplicateUser => (StatusCode::BAD_REQUEST, "duplicate_user"),
                AuthError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "invalid_credentials")
                },
                AuthError::MissingAuthorizationCode => {
                    (StatusCode::BAD_REQUEST, "missing_authorization_code")
                },
                AuthError::TokenExchangeFailed(_) => {
                    (StatusCode::BAD_REQUEST, "token_exchange_failed")
                },
                AuthError::InvalidIdentityToken(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_identity_token")
                },
                AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired"),
                AuthError::TokenInvalid => (StatusCode::UNAUTHORIZED, "invalid_token"),
                AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token"),
                AuthError::Configuration(_)
                | AuthError::Storage(_)
                | AuthError::Crypto(_)
                | AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::FederationDisabled => (StatusCode::NOT_FOUND, "federation_disabled"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// Client-facing message. Provider and storage details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Auth(e) => match e {
                AuthError::TokenExchangeFailed(_) => "failed to retrieve identity token".into(),
                AuthError::InvalidIdentityToken(_) => "invalid identity token".into(),
                AuthError::TokenExpired | AuthError::TokenInvalid | AuthError::MissingToken => {
                    "authentication required".into()
                },
                AuthError::Configuration(_)
                | AuthError::Storage(_)
                | AuthError::Crypto(_)
                | AuthError::Internal(_) => "internal server error".into(),
                other => other.to_string(),
            },
            Self::Internal(_) => "internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: code,
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}
