// libs/appointment-cell/src/store/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, BookedInterval, SortField, SortOrder,
    MAX_DURATION_MINUTES,
};

use super::{
    AppointmentFilter, AppointmentPatch, AppointmentStore, NewAppointment, PageRequest, StoreError,
};

const TABLE_PATH: &str = "/rest/v1/appointments";

/// Row shape as persisted: identical to `Appointment` except `symptoms`,
/// which the backing table stores as a JSON-encoded string. The translation
/// happens here, at the store boundary, never in the engine.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentRow {
    id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    scheduled_at: DateTime<Utc>,
    duration: i32,
    status: AppointmentStatus,
    #[serde(rename = "type")]
    appointment_type: AppointmentType,
    reason: Option<String>,
    notes: Option<String>,
    symptoms: String,
    cancel_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        let symptoms = serde_json::from_str(&row.symptoms).unwrap_or_default();
        Appointment {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            scheduled_at: row.scheduled_at,
            duration: row.duration,
            status: row.status,
            appointment_type: row.appointment_type,
            reason: row.reason,
            notes: row.notes,
            symptoms,
            cancel_reason: row.cancel_reason,
            cancelled_at: row.cancelled_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn encode_ts(ts: DateTime<Utc>) -> String {
        urlencoding::encode(&ts.to_rfc3339()).into_owned()
    }

    fn filter_params(filter: &AppointmentFilter) -> Vec<String> {
        let mut params = Vec::new();

        if let Some(status) = filter.status {
            params.push(format!("status=eq.{status}"));
        }
        if let Some(appointment_type) = filter.appointment_type {
            params.push(format!("type=eq.{appointment_type}"));
        }
        if let Some(patient_id) = filter.patient_id {
            params.push(format!("patientId=eq.{patient_id}"));
        }
        if let Some(doctor_id) = filter.doctor_id {
            params.push(format!("doctorId=eq.{doctor_id}"));
        }
        if let Some(from) = filter.from_date {
            params.push(format!("scheduledAt=gte.{}", Self::encode_ts(from)));
        }
        if let Some(to) = filter.to_date {
            params.push(format!("scheduledAt=lte.{}", Self::encode_ts(to)));
        }

        params
    }

    fn sort_column(sort_by: SortField) -> &'static str {
        match sort_by {
            SortField::ScheduledAt => "scheduledAt",
            SortField::CreatedAt => "createdAt",
            SortField::Duration => "duration",
            SortField::Status => "status",
        }
    }

    fn patch_body(patch: &AppointmentPatch, updated_at: DateTime<Utc>) -> Value {
        let mut body = Map::new();

        if let Some(scheduled_at) = patch.scheduled_at {
            body.insert("scheduledAt".into(), json!(scheduled_at));
        }
        if let Some(duration) = patch.duration {
            body.insert("duration".into(), json!(duration));
        }
        if let Some(appointment_type) = patch.appointment_type {
            body.insert("type".into(), json!(appointment_type));
        }
        if let Some(reason) = &patch.reason {
            body.insert("reason".into(), json!(reason));
        }
        if let Some(notes) = &patch.notes {
            body.insert("notes".into(), json!(notes));
        }
        if let Some(symptoms) = &patch.symptoms {
            let encoded = serde_json::to_string(symptoms).unwrap_or_else(|_| "[]".to_string());
            body.insert("symptoms".into(), json!(encoded));
        }
        if let Some(status) = patch.status {
            body.insert("status".into(), json!(status));
        }
        if let Some(cancel_reason) = &patch.cancel_reason {
            body.insert("cancelReason".into(), json!(cancel_reason));
        }
        if let Some(cancelled_at) = patch.cancelled_at {
            body.insert("cancelledAt".into(), json!(cancelled_at));
        }
        if let Some(completed_at) = patch.completed_at {
            body.insert("completedAt".into(), json!(completed_at));
        }
        body.insert("updatedAt".into(), json!(updated_at));

        Value::Object(body)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
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

        let symptoms = serde_json::to_string(&appointment.symptoms)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let body = json!({
            "id": appointment.id,
            "patientId": appointment.patient_id,
            "doctorId": appointment.doctor_id,
            "scheduledAt": appointment.scheduled_at,
            "duration": appointment.duration,
            "status": appointment.status,
            "type": appointment.appointment_type,
            "reason": appointment.reason,
            "symptoms": symptoms,
            "createdAt": appointment.created_at,
            "updatedAt": appointment.updated_at,
        });

        self.supabase
            .request_no_content(Method::POST, TABLE_PATH, Some(body))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!("Persisted appointment {}", appointment.id);
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{TABLE_PATH}?id=eq.{id}&limit=1");
        let rows: Vec<AppointmentRow> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows.into_iter().next().map(Appointment::from))
    }

    async fn list(
        &self,
        filter: &AppointmentFilter,
        page: &PageRequest,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut params = Self::filter_params(filter);
        let direction = match page.sort_order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        params.push(format!("order={}.{}", Self::sort_column(page.sort_by), direction));
        params.push(format!("offset={}", page.skip));
        params.push(format!("limit={}", page.take));

        let path = format!("{TABLE_PATH}?{}", params.join("&"));
        let rows: Vec<AppointmentRow> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn count(&self, filter: &AppointmentFilter) -> Result<u64, StoreError> {
        let mut params = Self::filter_params(filter);
        params.push("select=id".to_string());
        params.push("limit=1".to_string());

        let path = format!("{TABLE_PATH}?{}", params.join("&"));
        let (_rows, total): (Vec<Value>, u64) = self
            .supabase
            .request_counted(&path)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(total)
    }

    async fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<Appointment, StoreError> {
        let body = Self::patch_body(&patch, Utc::now());
        let path = format!("{TABLE_PATH}?id=eq.{id}");

        self.supabase
            .request_no_content(Method::PATCH, &path, Some(body))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // PATCH against a missing id succeeds with an empty result set, so
        // existence is confirmed by reading the row back.
        self.get(id).await?.ok_or(StoreError::NotFound)
    }

    async fn list_active_for_doctor(
        &self,
        doctor_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut params = vec![
            format!("doctorId=eq.{doctor_id}"),
            "status=in.(SCHEDULED,CONFIRMED)".to_string(),
            "order=scheduledAt.asc".to_string(),
        ];
        if let Some(exclude_id) = exclude {
            params.push(format!("id=neq.{exclude_id}"));
        }

        let path = format!("{TABLE_PATH}?{}", params.join("&"));
        let rows: Vec<AppointmentRow> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(Appointment::from).collect())
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
        // The column only holds start times, so widen the window by the
        // longest possible appointment and drop rows that still end before
        // midnight. Anything spilling past midnight is kept.
        let window_start = start_of_day - Duration::minutes(MAX_DURATION_MINUTES as i64);

        let params = vec![
            format!("doctorId=eq.{doctor_id}"),
            "status=in.(SCHEDULED,CONFIRMED)".to_string(),
            format!("scheduledAt=gte.{}", Self::encode_ts(window_start)),
            format!("scheduledAt=lt.{}", Self::encode_ts(end_of_day)),
            "select=scheduledAt,duration".to_string(),
            "order=scheduledAt.asc".to_string(),
        ];

        let path = format!("{TABLE_PATH}?{}", params.join("&"));
        let mut intervals: Vec<BookedInterval> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        intervals.retain(|interval| interval.end() > start_of_day);

        Ok(intervals)
    }
}
