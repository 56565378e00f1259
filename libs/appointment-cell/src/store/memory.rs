// libs/appointment-cell/src/store/memory.rs
use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, BookedInterval, SortField, SortOrder};

use super::{
    AppointmentFilter, AppointmentPatch, AppointmentStore, NewAppointment, PageRequest, StoreError,
};

/// Store backed by a process-local map, for tests and local development.
/// Semantics (filtering, sorting, pagination, partial updates) match the
/// Supabase-backed store.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    records: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(filter: &AppointmentFilter, appointment: &Appointment) -> bool {
        if filter.status.is_some_and(|s| s != appointment.status) {
            return false;
        }
        if filter
            .appointment_type
            .is_some_and(|t| t != appointment.appointment_type)
        {
            return false;
        }
        if filter.patient_id.is_some_and(|id| id != appointment.patient_id) {
            return false;
        }
        if filter.doctor_id.is_some_and(|id| id != appointment.doctor_id) {
            return false;
        }
        if filter.from_date.is_some_and(|from| appointment.scheduled_at < from) {
            return false;
        }
        if filter.to_date.is_some_and(|to| appointment.scheduled_at > to) {
            return false;
        }
        true
    }

    fn compare(sort_by: SortField, a: &Appointment, b: &Appointment) -> Ordering {
        match sort_by {
            SortField::ScheduledAt => a.scheduled_at.cmp(&b.scheduled_at),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Duration => a.duration.cmp(&b.duration),
            SortField::Status => a.status.to_string().cmp(&b.status.to_string()),
        }
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            scheduled_at: new.scheduled_at,
            duration: new.duration,
            status: AppointmentStatus::Scheduled,
            appointment_type: new.appointment_type,
            reason: new.reason,
            notes: None,
            symptoms: new.symptoms,
            cancel_reason: None,
            cancelled_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.records
            .write()
            .await
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &AppointmentFilter,
        page: &PageRequest,
    ) -> Result<Vec<Appointment>, StoreError> {
        let records = self.records.read().await;
        let mut matched: Vec<Appointment> = records
            .values()
            .filter(|apt| Self::matches(filter, apt))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ordering = Self::compare(page.sort_by, a, b);
            match page.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        Ok(matched
            .into_iter()
            .skip(page.skip as usize)
            .take(page.take as usize)
            .collect())
    }

    async fn count(&self, filter: &AppointmentFilter) -> Result<u64, StoreError> {
        let records = self.records.read().await;
        Ok(records.values().filter(|apt| Self::matches(filter, apt)).count() as u64)
    }

    async fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<Appointment, StoreError> {
        let mut records = self.records.write().await;
        let appointment = records.get_mut(&id).ok_or(StoreError::NotFound)?;

        if let Some(scheduled_at) = patch.scheduled_at {
            appointment.scheduled_at = scheduled_at;
        }
        if let Some(duration) = patch.duration {
            appointment.duration = duration;
        }
        if let Some(appointment_type) = patch.appointment_type {
            appointment.appointment_type = appointment_type;
        }
        if let Some(reason) = patch.reason {
            appointment.reason = Some(reason);
        }
        if let Some(notes) = patch.notes {
            appointment.notes = Some(notes);
        }
        if let Some(symptoms) = patch.symptoms {
            appointment.symptoms = symptoms;
        }
        if let Some(status) = patch.status {
            appointment.status = status;
        }
        if let Some(cancel_reason) = patch.cancel_reason {
            appointment.cancel_reason = Some(cancel_reason);
        }
        if let Some(cancelled_at) = patch.cancelled_at {
            appointment.cancelled_at = Some(cancelled_at);
        }
        if let Some(completed_at) = patch.completed_at {
            appointment.completed_at = Some(completed_at);
        }
        appointment.updated_at = Utc::now();

        Ok(appointment.clone())
    }

    async fn list_active_for_doctor(
        &self,
        doctor_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let records = self.records.read().await;
        let mut active: Vec<Appointment> = records
            .values()
            .filter(|apt| {
                apt.doctor_id == doctor_id
                    && apt.status.is_active()
                    && exclude != Some(apt.id)
            })
            .cloned()
            .collect();
        active.sort_by_key(|apt| apt.scheduled_at);
        Ok(active)
    }

    async fn list_for_doctor_on_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, StoreError> {
        let start_of_day = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        let end_of_day = start_of_day + Duration::days(1);

        let records = self.records.read().await;
        let mut booked: Vec<BookedInterval> = records
            .values()
            .filter(|apt| {
                apt.doctor_id == doctor_id
                    && apt.status.is_active()
                    && apt.scheduled_at < end_of_day
                    && apt.scheduled_end() > start_of_day
            })
            .map(|apt| BookedInterval {
                scheduled_at: apt.scheduled_at,
                duration: apt.duration,
            })
            .collect();
        booked.sort_by_key(|interval| interval.scheduled_at);
        Ok(booked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentType;
    use chrono::Duration;

    fn new_appointment(doctor_id: Uuid, offset_hours: i64) -> NewAppointment {
        NewAppointment {
            patient_id: Uuid::new_v4(),
            doctor_id,
            scheduled_at: Utc::now() + Duration::hours(offset_hours),
            duration: 30,
            appointment_type: AppointmentType::InPerson,
            reason: None,
            symptoms: vec![],
        }
    }

    #[tokio::test]
    async fn count_reflects_list_filter() {
        let store = InMemoryAppointmentStore::new();
        let doctor = Uuid::new_v4();
        store.create(new_appointment(doctor, 24)).await.unwrap();
        store.create(new_appointment(doctor, 48)).await.unwrap();
        store.create(new_appointment(Uuid::new_v4(), 24)).await.unwrap();

        let filter = AppointmentFilter {
            doctor_id: Some(doctor),
            ..Default::default()
        };
        let page = PageRequest {
            skip: 0,
            take: 10,
            sort_by: SortField::ScheduledAt,
            sort_order: SortOrder::Asc,
        };

        assert_eq!(store.list(&filter, &page).await.unwrap().len(), 2);
        assert_eq!(store.count(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn cancelled_appointments_drop_out_of_active_listing() {
        let store = InMemoryAppointmentStore::new();
        let doctor = Uuid::new_v4();
        let apt = store.create(new_appointment(doctor, 24)).await.unwrap();

        assert_eq!(store.list_active_for_doctor(doctor, None).await.unwrap().len(), 1);

        store
            .update(
                apt.id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(store.list_active_for_doctor(doctor, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exclude_id_skips_own_record() {
        let store = InMemoryAppointmentStore::new();
        let doctor = Uuid::new_v4();
        let apt = store.create(new_appointment(doctor, 24)).await.unwrap();

        let active = store.list_active_for_doctor(doctor, Some(apt.id)).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn day_listing_includes_bookings_spilling_past_midnight() {
        let store = InMemoryAppointmentStore::new();
        let doctor = Uuid::new_v4();
        let day = (Utc::now() + Duration::days(7)).date_naive();
        let start_of_day = day.and_hms_opt(0, 0, 0).unwrap().and_utc();

        // 22:30 the previous evening, 180 minutes: ends 01:30 on the day.
        let mut spillover = new_appointment(doctor, 0);
        spillover.scheduled_at = start_of_day - Duration::minutes(90);
        spillover.duration = 180;
        store.create(spillover).await.unwrap();

        // 22:00 the previous evening, 30 minutes: over before midnight.
        let mut previous_day = new_appointment(doctor, 0);
        previous_day.scheduled_at = start_of_day - Duration::minutes(120);
        store.create(previous_day).await.unwrap();

        let booked = store.list_for_doctor_on_date(doctor, day).await.unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].duration, 180);
    }

    #[tokio::test]
    async fn update_on_missing_id_is_not_found() {
        let store = InMemoryAppointmentStore::new();
        let result = store.update(Uuid::new_v4(), AppointmentPatch::default()).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
