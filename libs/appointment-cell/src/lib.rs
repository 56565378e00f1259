pub mod cache;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use router::{appointment_routes, AppointmentCellState};
pub use services::scheduling::SchedulingService;
