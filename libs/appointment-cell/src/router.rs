// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::scheduling::SchedulingService;

/// Injected dependencies for the appointment cell; built once at startup
/// and cloned into handlers. No process-wide singletons.
#[derive(Clone)]
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub scheduling: Arc<SchedulingService>,
}

impl AppointmentCellState {
    pub fn new(config: Arc<AppConfig>, scheduling: Arc<SchedulingService>) -> Self {
        Self { config, scheduling }
    }
}

pub fn appointment_routes(state: AppointmentCellState) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/", get(handlers::list_appointments))
        .route("/availability/{doctor_id}", get(handlers::get_doctor_availability))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", put(handlers::update_appointment))
        .route("/{appointment_id}/cancel", patch(handlers::cancel_appointment))
        .route("/{appointment_id}/confirm", patch(handlers::confirm_appointment))
        .route("/{appointment_id}/complete", patch(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
