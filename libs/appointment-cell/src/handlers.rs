// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentQuery, CancelAppointmentRequest, CompleteAppointmentRequest,
    CreateAppointmentRequest, DoctorAvailability, PaginatedAppointments, UpdateAppointmentRequest,
};
use crate::router::AppointmentCellState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = state.scheduling.create(request, &user).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentCellState>,
    Query(query): Query<AppointmentQuery>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PaginatedAppointments>, AppError> {
    let page = state.scheduling.list(query, &user).await?;
    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.scheduling.get(appointment_id, &user).await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.scheduling.update(appointment_id, request, &user).await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.scheduling.cancel(appointment_id, request, &user).await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.scheduling.confirm(appointment_id, &user).await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.scheduling.complete(appointment_id, request, &user).await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<AppointmentCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
    Extension(_user): Extension<AuthUser>,
) -> Result<Json<DoctorAvailability>, AppError> {
    let availability = state.scheduling.availability(doctor_id, query.date).await?;
    Ok(Json(availability))
}
