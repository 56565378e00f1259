// libs/appointment-cell/src/identity.rs
//
// Patient and doctor identity is owned by an external service; the engine
// only needs existence checks and actor-to-profile resolution.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::SchedulingError;

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError>;
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, SchedulingError>;

    /// Resolve an authenticated user to their patient profile id.
    /// `None` means the profile simply does not exist; that is not an error.
    async fn patient_for_user(&self, user_id: &str) -> Result<Option<Uuid>, SchedulingError>;
    async fn doctor_for_user(&self, user_id: &str) -> Result<Option<Uuid>, SchedulingError>;
}

// ==============================================================================
// SUPABASE-BACKED DIRECTORY
// ==============================================================================

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: Uuid,
}

pub struct SupabaseIdentityDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseIdentityDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn exists(&self, table: &str, id: Uuid) -> Result<bool, SchedulingError> {
        let path = format!("/rest/v1/{}?id=eq.{}&select=id&limit=1", table, id);
        let rows: Vec<ProfileRow> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| SchedulingError::Storage(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    async fn profile_for_user(&self, table: &str, user_id: &str) -> Result<Option<Uuid>, SchedulingError> {
        let path = format!(
            "/rest/v1/{}?userId=eq.{}&select=id&limit=1",
            table,
            urlencoding::encode(user_id)
        );
        let rows: Vec<ProfileRow> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| SchedulingError::Storage(e.to_string()))?;

        debug!("Resolved {} profile for user {}: {}", table, user_id, !rows.is_empty());
        Ok(rows.into_iter().next().map(|row| row.id))
    }
}

#[async_trait]
impl IdentityDirectory for SupabaseIdentityDirectory {
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError> {
        self.exists("patients", patient_id).await
    }

    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, SchedulingError> {
        self.exists("doctors", doctor_id).await
    }

    async fn patient_for_user(&self, user_id: &str) -> Result<Option<Uuid>, SchedulingError> {
        self.profile_for_user("patients", user_id).await
    }

    async fn doctor_for_user(&self, user_id: &str) -> Result<Option<Uuid>, SchedulingError> {
        self.profile_for_user("doctors", user_id).await
    }
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

/// Directory backed by plain maps, for tests and local development.
/// Keys are profile ids, values the owning identity-service user id.
#[derive(Default)]
pub struct InMemoryIdentityDirectory {
    patients: RwLock<HashMap<Uuid, String>>,
    doctors: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_patient(&self, patient_id: Uuid, user_id: &str) {
        self.patients.write().await.insert(patient_id, user_id.to_string());
    }

    pub async fn add_doctor(&self, doctor_id: Uuid, user_id: &str) {
        self.doctors.write().await.insert(doctor_id, user_id.to_string());
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError> {
        Ok(self.patients.read().await.contains_key(&patient_id))
    }

    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, SchedulingError> {
        Ok(self.doctors.read().await.contains_key(&doctor_id))
    }

    async fn patient_for_user(&self, user_id: &str) -> Result<Option<Uuid>, SchedulingError> {
        Ok(self
            .patients
            .read()
            .await
            .iter()
            .find(|(_, owner)| owner.as_str() == user_id)
            .map(|(id, _)| *id))
    }

    async fn doctor_for_user(&self, user_id: &str) -> Result<Option<Uuid>, SchedulingError> {
        Ok(self
            .doctors
            .read()
            .await
            .iter()
            .find(|(_, owner)| owner.as_str() == user_id)
            .map(|(id, _)| *id))
    }
}
