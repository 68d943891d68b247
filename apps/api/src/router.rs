use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use scheduling_cell::router::scheduling_routes;
use scheduling_cell::services::SchedulerService;

pub fn create_router(scheduler: Arc<SchedulerService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Scheduling API is running!" }))
        .nest("/scheduling", scheduling_routes(scheduler))
}
