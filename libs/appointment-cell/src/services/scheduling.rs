// libs/appointment-cell/src/services/scheduling.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::AuthUser;

use crate::cache::AppointmentCache;
use crate::identity::IdentityDirectory;
use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, AppointmentType, CancelAppointmentRequest,
    CompleteAppointmentRequest, CreateAppointmentRequest, DoctorAvailability,
    PaginatedAppointments, SchedulingError, UpdateAppointmentRequest, DEFAULT_DURATION_MINUTES,
    DEFAULT_PAGE_SIZE, MAX_DURATION_MINUTES, MAX_PAGE_SIZE, MIN_DURATION_MINUTES,
};
use crate::services::access::{AccessPolicy, ListScope};
use crate::services::overlap::find_conflict;
use crate::services::slots::day_slots;
use crate::store::{AppointmentFilter, AppointmentPatch, AppointmentStore, NewAppointment, PageRequest};

/// Per-doctor async mutex registry. Conflict-check-then-write for the same
/// doctor must not interleave, otherwise two concurrent bookings can both
/// read "no conflict" before either write lands. The backing store gives no
/// exclusion constraint, so the serialization happens here.
#[derive(Default)]
struct DoctorLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl DoctorLocks {
    fn for_doctor(&self, doctor_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().expect("doctor lock registry poisoned");
        // Drop mutexes nobody holds anymore; the registry stays bounded by
        // the number of doctors with in-flight bookings.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(doctor_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Orchestrates the appointment lifecycle: creation, rescheduling,
/// cancellation, confirmation, completion and availability queries.
/// Owns the status state machine and the conflict-checking protocol;
/// invalidates the read-through cache after every successful write.
pub struct SchedulingService {
    store: Arc<dyn AppointmentStore>,
    cache: Arc<dyn AppointmentCache>,
    directory: Arc<dyn IdentityDirectory>,
    access: AccessPolicy,
    doctor_locks: DoctorLocks,
}

impl SchedulingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        cache: Arc<dyn AppointmentCache>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        let access = AccessPolicy::new(directory.clone());
        Self {
            store,
            cache,
            directory,
            access,
            doctor_locks: DoctorLocks::default(),
        }
    }

    fn validate_duration(duration: i32) -> Result<(), SchedulingError> {
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration) {
            return Err(SchedulingError::InvalidRequest(format!(
                "Duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
            )));
        }
        Ok(())
    }

    fn ensure_future(scheduled_at: chrono::DateTime<Utc>) -> Result<(), SchedulingError> {
        if scheduled_at <= Utc::now() {
            return Err(SchedulingError::InvalidRequest(
                "Appointment must be scheduled in the future".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create(
        &self,
        request: CreateAppointmentRequest,
        actor: &AuthUser,
    ) -> Result<Appointment, SchedulingError> {
        if !self.directory.patient_exists(request.patient_id).await? {
            return Err(SchedulingError::PatientNotFound);
        }
        if !self.directory.doctor_exists(request.doctor_id).await? {
            return Err(SchedulingError::DoctorNotFound);
        }

        if !self.access.can_create(actor, request.patient_id).await? {
            return Err(SchedulingError::Forbidden(
                "You can only book appointments for yourself".to_string(),
            ));
        }

        let duration = request.duration.unwrap_or(DEFAULT_DURATION_MINUTES);
        Self::validate_duration(duration)?;
        Self::ensure_future(request.scheduled_at)?;

        let lock = self.doctor_locks.for_doctor(request.doctor_id);
        let _guard = lock.lock().await;

        let existing = self
            .store
            .list_active_for_doctor(request.doctor_id, None)
            .await?;
        if let Some(conflicting) = find_conflict(request.scheduled_at, duration, &existing) {
            warn!(
                "Booking conflict for doctor {}: candidate {} overlaps appointment {}",
                request.doctor_id, request.scheduled_at, conflicting.id
            );
            return Err(SchedulingError::Conflict);
        }

        let appointment = self
            .store
            .create(NewAppointment {
                patient_id: request.patient_id,
                doctor_id: request.doctor_id,
                scheduled_at: request.scheduled_at,
                duration,
                appointment_type: request.appointment_type.unwrap_or(AppointmentType::InPerson),
                reason: request.reason,
                symptoms: request.symptoms.unwrap_or_default(),
            })
            .await?;

        info!("Appointment created: {}", appointment.id);
        Ok(appointment)
    }

    /// Cache hits still run the access check: cache entries are full,
    /// unfiltered records and must never bypass authorization.
    pub async fn get(&self, id: Uuid, actor: &AuthUser) -> Result<Appointment, SchedulingError> {
        if let Some(cached) = self.cache.get(id).await {
            debug!("Cache hit for appointment {}", id);
            if !self.access.can_access(&cached, actor).await? {
                return Err(SchedulingError::Forbidden(
                    "You do not have access to this appointment".to_string(),
                ));
            }
            return Ok(cached);
        }

        let appointment = self
            .store
            .get(id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;

        if !self.access.can_access(&appointment, actor).await? {
            return Err(SchedulingError::Forbidden(
                "You do not have access to this appointment".to_string(),
            ));
        }

        self.cache.set(&appointment).await;
        Ok(appointment)
    }

    pub async fn list(
        &self,
        query: AppointmentQuery,
        actor: &AuthUser,
    ) -> Result<PaginatedAppointments, SchedulingError> {
        let mut filter = AppointmentFilter {
            status: query.status,
            appointment_type: query.appointment_type,
            patient_id: query.patient_id,
            doctor_id: query.doctor_id,
            from_date: query.from_date,
            to_date: query.to_date,
        };

        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        if self.access.scope_list(actor, &mut filter).await? == ListScope::Nothing {
            return Ok(PaginatedAppointments::empty(page, limit));
        }

        let page_request = PageRequest {
            skip: (page as u64 - 1) * limit as u64,
            take: limit as u64,
            sort_by: query.sort_by.unwrap_or_default(),
            sort_order: query.sort_order.unwrap_or_default(),
        };

        let items = self.store.list(&filter, &page_request).await?;
        let total = self.store.count(&filter).await?;

        Ok(PaginatedAppointments::new(items, total, page, limit))
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateAppointmentRequest,
        actor: &AuthUser,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .store
            .get(id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;

        if !self.access.can_access(&appointment, actor).await? {
            return Err(SchedulingError::Forbidden(
                "You do not have access to this appointment".to_string(),
            ));
        }

        if appointment.status.is_terminal() {
            return Err(SchedulingError::InvalidRequest(
                "Cannot update a cancelled or completed appointment".to_string(),
            ));
        }

        if let Some(duration) = request.duration {
            Self::validate_duration(duration)?;
        }

        let patch = AppointmentPatch {
            scheduled_at: request.scheduled_at,
            duration: request.duration,
            appointment_type: request.appointment_type,
            reason: request.reason,
            notes: request.notes,
            symptoms: request.symptoms,
            ..Default::default()
        };

        let updated = if let Some(new_start) = request.scheduled_at {
            Self::ensure_future(new_start)?;
            let duration = request.duration.unwrap_or(appointment.duration);

            // Reschedule: conflict check and write under the doctor's lock,
            // excluding this appointment so it cannot conflict with itself.
            let lock = self.doctor_locks.for_doctor(appointment.doctor_id);
            let _guard = lock.lock().await;

            let existing = self
                .store
                .list_active_for_doctor(appointment.doctor_id, Some(id))
                .await?;
            if find_conflict(new_start, duration, &existing).is_some() {
                return Err(SchedulingError::Conflict);
            }

            self.store.update(id, patch).await?
        } else {
            self.store.update(id, patch).await?
        };

        // Invalidate only after the write committed.
        self.cache.delete(id).await;

        info!("Appointment updated: {}", id);
        Ok(updated)
    }

    pub async fn cancel(
        &self,
        id: Uuid,
        request: CancelAppointmentRequest,
        actor: &AuthUser,
    ) -> Result<Appointment, SchedulingError> {
        if request.reason.trim().is_empty() {
            return Err(SchedulingError::InvalidRequest(
                "Cancellation reason is required".to_string(),
            ));
        }

        let appointment = self
            .store
            .get(id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;

        if !self.access.can_access(&appointment, actor).await? {
            return Err(SchedulingError::Forbidden(
                "You do not have access to this appointment".to_string(),
            ));
        }

        // A second cancel is an error, not a no-op.
        if appointment.status == AppointmentStatus::Cancelled {
            return Err(SchedulingError::InvalidRequest(
                "Appointment is already cancelled".to_string(),
            ));
        }
        if appointment.status == AppointmentStatus::Completed {
            return Err(SchedulingError::InvalidRequest(
                "Cannot cancel a completed appointment".to_string(),
            ));
        }

        let updated = self
            .store
            .update(
                id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Cancelled),
                    cancel_reason: Some(request.reason),
                    cancelled_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        self.cache.delete(id).await;

        info!("Appointment cancelled: {}", id);
        Ok(updated)
    }

    pub async fn confirm(&self, id: Uuid, actor: &AuthUser) -> Result<Appointment, SchedulingError> {
        if !self.access.can_transition(actor) {
            return Err(SchedulingError::Forbidden(
                "Only doctors can confirm appointments".to_string(),
            ));
        }

        let appointment = self
            .store
            .get(id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(SchedulingError::InvalidRequest(
                "Only scheduled appointments can be confirmed".to_string(),
            ));
        }

        let updated = self
            .store
            .update(
                id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Confirmed),
                    ..Default::default()
                },
            )
            .await?;

        self.cache.delete(id).await;
        Ok(updated)
    }

    /// IN_PROGRESS has no engine-exposed entry transition; it is reachable
    /// only administratively, but completion accepts it as a predecessor.
    pub async fn complete(
        &self,
        id: Uuid,
        request: CompleteAppointmentRequest,
        actor: &AuthUser,
    ) -> Result<Appointment, SchedulingError> {
        if !self.access.can_transition(actor) {
            return Err(SchedulingError::Forbidden(
                "Only doctors can complete appointments".to_string(),
            ));
        }

        let appointment = self
            .store
            .get(id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;

        if !matches!(
            appointment.status,
            AppointmentStatus::Confirmed | AppointmentStatus::InProgress
        ) {
            return Err(SchedulingError::InvalidRequest(
                "Only confirmed or in-progress appointments can be completed".to_string(),
            ));
        }

        let updated = self
            .store
            .update(
                id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Completed),
                    notes: request.notes,
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        self.cache.delete(id).await;

        info!("Appointment completed: {}", id);
        Ok(updated)
    }

    /// Aggregate read; deliberately bypasses the per-id cache.
    pub async fn availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<DoctorAvailability, SchedulingError> {
        if !self.directory.doctor_exists(doctor_id).await? {
            return Err(SchedulingError::DoctorNotFound);
        }

        let booked = self.store.list_for_doctor_on_date(doctor_id, date).await?;
        let slots = day_slots(date, &booked, Utc::now());

        Ok(DoctorAvailability { doctor_id, date, slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_doctor_locks_are_pruned() {
        let locks = DoctorLocks::default();
        let idle_doctor = Uuid::new_v4();

        drop(locks.for_doctor(idle_doctor));
        locks.for_doctor(Uuid::new_v4());

        assert!(!locks
            .inner
            .lock()
            .unwrap()
            .contains_key(&idle_doctor));
    }

    #[tokio::test]
    async fn held_doctor_locks_survive_pruning() {
        let locks = DoctorLocks::default();
        let busy_doctor = Uuid::new_v4();

        let held = locks.for_doctor(busy_doctor);
        let _guard = held.lock().await;
        locks.for_doctor(Uuid::new_v4());

        assert!(locks.inner.lock().unwrap().contains_key(&busy_doctor));
    }
}
