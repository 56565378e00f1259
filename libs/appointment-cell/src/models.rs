// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::error::AppError;

/// Domain bounds on appointment length, in minutes.
pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 180;
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration: i32,
    pub status: AppointmentStatus,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Vec<String>,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// End of the appointment's half-open interval `[scheduled_at, end)`.
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Active appointments hold their doctor's time slot; terminal and
    /// in-progress ones do not participate in conflict detection.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::Confirmed => write!(f, "CONFIRMED"),
            AppointmentStatus::InProgress => write!(f, "IN_PROGRESS"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Informational only; has no effect on scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    InPerson,
    Telehealth,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InPerson => write!(f, "IN_PERSON"),
            AppointmentType::Telehealth => write!(f, "TELEHEALTH"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration: Option<i32>,
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
    pub symptoms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    #[serde(rename = "scheduledAt")]
    ScheduledAt,
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "duration")]
    Duration,
    #[serde(rename = "status")]
    Status,
}

impl Default for SortField {
    fn default() -> Self {
        SortField::ScheduledAt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedAppointments {
    pub data: Vec<Appointment>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl PaginatedAppointments {
    pub fn new(data: Vec<Appointment>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64) as u32
        };
        Self { data, total, page, limit, total_pages }
    }

    pub fn empty(page: u32, limit: u32) -> Self {
        Self::new(Vec::new(), 0, page, limit)
    }
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub time: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<AvailabilitySlot>,
}

/// Minimal projection used by the slot generator; the aggregate read
/// deliberately bypasses the per-id cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedInterval {
    pub scheduled_at: DateTime<Utc>,
    pub duration: i32,
}

impl BookedInterval {
    pub fn end(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration as i64)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Business outcomes of engine operations. All four non-storage variants are
/// terminal, caller-recoverable conditions and are never retried internally.
/// `Storage` carries infrastructure failures so callers can tell "your
/// request is invalid" apart from "try again".
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("This time slot is not available")]
    Conflict,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::PatientNotFound
            | SchedulingError::DoctorNotFound
            | SchedulingError::AppointmentNotFound => AppError::NotFound(err.to_string()),
            SchedulingError::Forbidden(msg) => AppError::Forbidden(msg),
            SchedulingError::InvalidRequest(msg) => AppError::BadRequest(msg),
            SchedulingError::Conflict => AppError::Conflict(err.to_string()),
            SchedulingError::Storage(msg) => AppError::Internal(msg),
        }
    }
}
