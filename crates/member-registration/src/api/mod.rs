//! HTTP API for the registration service.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{logging_middleware, permissive_cors};
pub use types::*;

use crate::service::RegistrationService;
use axum::{middleware as axum_middleware, routing::get, routing::post, Router};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Signup and lookup rules over the registry store
    pub service: RegistrationService,
}

impl AppState {
    /// Create new application state.
    pub fn new(service: RegistrationService) -> Self {
        Self { service }
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/signup", post(handlers::signup))
        .route("/api/lookup", get(handlers::lookup))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the API router, optionally accepting cross-origin requests.
pub fn create_router_with_cors(state: AppState, allow_any_origin: bool) -> Router {
    let router = create_router(state);
    if allow_any_origin {
        router.layer(permissive_cors())
    } else {
        router
    }
}
