use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentCellState};

pub fn create_router(state: AppointmentCellState) -> Router {
    Router::new()
        .route("/", get(|| async { "CareSync API is running!" }))
        .nest("/appointments", appointment_routes(state))
}
