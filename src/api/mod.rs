//! HTTP routing
//!
//! # Structure
//!
//! - [`employees`] - employee month records and batch operations
//! - [`change_log`] - change ledger queries and chain verification
//! - [`health`] - liveness and component checks
//!
//! Each resource module exposes `pub fn router() -> Router<ServerState>`;
//! [`build_app`] composes them with the shared middleware stack.

pub mod change_log;
pub mod employees;
pub mod health;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// All routes, no middleware applied
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(employees::router())
        .merge(change_log::router())
        .merge(health::router())
}

/// Fully layered application router
pub fn build_app() -> Router<ServerState> {
    build_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
