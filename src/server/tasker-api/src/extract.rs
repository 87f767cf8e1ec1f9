//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tasker_auth::{AuthContext, AuthError};
use tasker_storage::UserId;

use crate::{ApiError, AppState};

/// Caller identity established by the authorization gate.
///
/// Taking this as a handler argument makes the route protected: the gate runs
/// before the handler body and rejects with 401 on failure.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub AuthContext);

impl Authenticated {
    /// The verified user id.
    pub fn user_id(&self) -> UserId {
        self.0.user_id
    }
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| AuthError::TokenInvalid)?),
            None => None,
        };

        let ctx = state.gate.authorize(header).await?;
        Ok(Self(ctx))
    }
}
