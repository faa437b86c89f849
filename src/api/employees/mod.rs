//! Employee API Module

mod handler;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/employees", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/import", post(handler::import))
        .route("/recalculate", post(handler::recalculate))
        .route("/{empid}", delete(handler::delete_all_months))
        .route(
            "/{empid}/{month}/{year}",
            get(handler::get_month)
                .put(handler::update_month)
                .delete(handler::delete_month),
        )
}
