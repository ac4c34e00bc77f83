//! REST API route definitions.

use axum::{
    routing::{get, post},
    Router,
};

use crate::web::handlers::panels;
use crate::web::state::WebAppState;

/// Build the API router with all REST endpoints.
pub fn api_routes() -> Router<WebAppState> {
    Router::new()
        .route("/panels", get(panels::list_panels))
        .route("/panels/{id}", get(panels::get_panel))
        .route("/theme", post(panels::set_theme))
        .route("/connection", post(panels::update_connection))
}
