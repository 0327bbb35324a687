// Library exports for devlink
// This allows integration tests and external code to use devlink modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod github;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full API router. The SPA client calls from another origin,
/// so CORS must admit the x-auth-token request header.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::users::router())
        .merge(routes::auth::router())
        .merge(routes::posts::router())
        .merge(routes::profile::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
