pub mod routes;

use axum::{Router, routing::get};

use crate::core::db::DetectionDb;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    pub db: DetectionDb,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/detections",
            get(routes::list_detections).post(routes::create_detection),
        )
        .route(
            "/detections/:id",
            get(routes::get_detection).patch(routes::update_detection),
        )
        .with_state(state)
}
