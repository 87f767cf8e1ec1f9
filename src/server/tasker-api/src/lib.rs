//! # Tasker API
//!
//! REST API layer for Tasker.
//!
//! ## Endpoints
//!
//! - `POST /register`, `POST /login` - local accounts
//! - `GET /auth/google`, `GET /auth/google/callback` - federated login
//! - `/todos`, `/todos/{id}` - task CRUD, bearer token required
//! - `GET /health` - liveness

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extract;
pub(crate) mod handlers;
pub mod notify;
pub mod state;


use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, Request};
use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, warn, Span};

pub use error::ApiError;
pub use extract::Authenticated;
pub use notify::{
    spawn_notifier, EmailMessage, EmailSender, HttpEmailSender, LogEmailSender, Notifier,
};
pub use state::AppState;

/// Builds the HTTP router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.frontend_url());

    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/auth/google", get(handlers::auth::google_login))
        .route("/auth/google/callback", get(handlers::auth::google_callback))
        .route(
            "/todos",
            get(handlers::todos::list).post(handlers::todos::create),
        )
        .route(
            "/todos/{id}",
            put(handlers::todos::update).delete(handlers::todos::delete),
        )
        .route("/health", get(handlers::health::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(frontend_url, "Frontend URL is not a valid origin, CORS disabled");
            layer
        },
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
    )
}
