use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers;
use crate::services::SchedulerService;

pub fn scheduling_routes(state: Arc<SchedulerService>) -> Router {
    // No authentication layer: callers front this router with their own.
    Router::new()
        .route("/conflicts/check", post(handlers::check_conflicts))
        .route("/availability/{practitioner_id}", get(handlers::get_availability))
        .route("/alternatives", post(handlers::suggest_alternatives))
        .route("/validate", post(handlers::validate_scheduling))
        .route("/bookings", post(handlers::book))
        .route("/series", post(handlers::create_series))
        .route(
            "/series/{booking_id}",
            patch(handlers::update_series).delete(handlers::delete_series),
        )
        .with_state(state)
}
