//! Router assembly, the role `hook-api::handlers::app::add_routes` plays
//! for the webhook-ingest service.

pub mod async_handler;
pub mod health;
pub mod requests;
pub mod sync;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/sync", post(sync::post))
        .route("/async", post(async_handler::post))
        .route("/requests", get(requests::list))
        .route("/requests/:id", get(requests::detail))
        .route("/healthz", get(health::get))
}
