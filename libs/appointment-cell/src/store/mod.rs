// libs/appointment-cell/src/store/mod.rs
pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, BookedInterval, SchedulingError, SortField,
    SortOrder,
};

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration: i32,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub symptoms: Vec<String>,
}

/// Partial update; `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub status: Option<AppointmentStatus>,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub skip: u64,
    pub take: u64,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => SchedulingError::AppointmentNotFound,
            StoreError::Backend(msg) => SchedulingError::Storage(msg),
        }
    }
}

/// Persistence operations for appointments. Implementations are assumed to
/// execute against a consistent backing store; serialization of
/// conflict-check-then-write sequences is the scheduling service's job.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn list(
        &self,
        filter: &AppointmentFilter,
        page: &PageRequest,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Must apply exactly the same filter as `list` so pagination totals
    /// stay honest.
    async fn count(&self, filter: &AppointmentFilter) -> Result<u64, StoreError>;

    async fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<Appointment, StoreError>;

    /// SCHEDULED/CONFIRMED appointments for the doctor, optionally excluding
    /// one id (so a reschedule does not conflict with itself).
    async fn list_active_for_doctor(
        &self,
        doctor_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Active appointments whose interval overlaps the given calendar day,
    /// ascending by start time. A booking that starts the previous evening
    /// and spills past midnight counts.
    async fn list_for_doctor_on_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, StoreError>;
}
