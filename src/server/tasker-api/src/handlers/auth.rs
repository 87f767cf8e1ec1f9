use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::json_body;
use crate::{ApiError, AppState};

#[derive(Deserialize)]
pub struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
pub struct Registered {
    id: i64,
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    access_token: String,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// 302 Found.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<Registered>), ApiError> {
    let creds = json_body(payload)?;

    let user = state.local.register(&creds.username, &creds.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(Registered {
            id: user.id,
            message: "User created successfully",
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let creds = json_body(payload)?;

    let user = state
        .local
        .authenticate(&creds.username, &creds.password)
        .await?;
    let access_token = state.issuer.issue(user.id)?;

    info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse { access_token }))
}

pub async fn google_login(State(state): State<AppState>) -> Result<Response, ApiError> {
    let broker = state.federation.as_ref().ok_or(ApiError::FederationDisabled)?;

    debug!("Redirecting to identity provider");

    Ok(found(broker.authorization_url().as_str()))
}

#[instrument(skip_all)]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let broker = state.federation.as_ref().ok_or(ApiError::FederationDisabled)?;

    if let Some(error) = params.error.as_deref() {
        warn!(%error, "Identity provider returned an error");
    }

    let login = broker.handle_callback(params.code.as_deref()).await?;

    Ok(found(&format!(
        "{}/login?token={}",
        state.frontend_url, login.access_token
    )))
}
