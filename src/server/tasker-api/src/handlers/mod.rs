pub mod auth;
pub mod health;
pub mod todos;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::ApiError;

/// Unwraps a JSON body, turning extractor rejections into our error format.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}
