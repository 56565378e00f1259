// libs/appointment-cell/src/services/access.rs
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{AuthUser, Role};

use crate::identity::IdentityDirectory;
use crate::models::{Appointment, SchedulingError};
use crate::store::AppointmentFilter;

/// Outcome of narrowing a list filter to what the actor may see.
#[derive(Debug, PartialEq, Eq)]
pub enum ListScope {
    /// Filter (possibly narrowed) should be executed as-is.
    Visible,
    /// Actor has no matching identity profile; the result set is empty by
    /// construction, without touching the store.
    Nothing,
}

/// Role-scoped visibility rules, resolved per `Role` variant.
///
/// Note the deliberate asymmetry: confirm/complete are gated on role
/// membership alone (`can_transition`), while read access additionally
/// requires doctor-ownership. This mirrors the upstream product behavior
/// and is flagged for product clarification, not a bug to fix here.
pub struct AccessPolicy {
    directory: Arc<dyn IdentityDirectory>,
}

impl AccessPolicy {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { directory }
    }

    /// May the actor read or mutate this specific appointment?
    /// A missing identity profile is treated as no match, not an error.
    pub async fn can_access(
        &self,
        appointment: &Appointment,
        actor: &AuthUser,
    ) -> Result<bool, SchedulingError> {
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Patient => self
                .directory
                .patient_for_user(&actor.id)
                .await?
                .is_some_and(|patient_id| patient_id == appointment.patient_id),
            Role::Doctor => self
                .directory
                .doctor_for_user(&actor.id)
                .await?
                .is_some_and(|doctor_id| doctor_id == appointment.doctor_id),
        };

        if !allowed {
            debug!(
                "Access denied: {} {} on appointment {}",
                actor.role, actor.id, appointment.id
            );
        }
        Ok(allowed)
    }

    /// Patients may only book on behalf of themselves; staff may book for
    /// any patient.
    pub async fn can_create(
        &self,
        actor: &AuthUser,
        patient_id: Uuid,
    ) -> Result<bool, SchedulingError> {
        match actor.role {
            Role::Admin | Role::Doctor => Ok(true),
            Role::Patient => Ok(self
                .directory
                .patient_for_user(&actor.id)
                .await?
                .is_some_and(|own_id| own_id == patient_id)),
        }
    }

    /// Role gate for confirm/complete: any doctor or admin, regardless of
    /// which doctor owns the appointment.
    pub fn can_transition(&self, actor: &AuthUser) -> bool {
        actor.role.is_staff()
    }

    /// Force-narrow a list filter to the actor's own records. Silent, not an
    /// error: patients and doctors simply never see other people's rows.
    pub async fn scope_list(
        &self,
        actor: &AuthUser,
        filter: &mut AppointmentFilter,
    ) -> Result<ListScope, SchedulingError> {
        match actor.role {
            Role::Admin => Ok(ListScope::Visible),
            Role::Patient => match self.directory.patient_for_user(&actor.id).await? {
                Some(patient_id) => {
                    filter.patient_id = Some(patient_id);
                    Ok(ListScope::Visible)
                }
                None => Ok(ListScope::Nothing),
            },
            Role::Doctor => match self.directory.doctor_for_user(&actor.id).await? {
                Some(doctor_id) => {
                    filter.doctor_id = Some(doctor_id);
                    Ok(ListScope::Visible)
                }
                None => Ok(ListScope::Nothing),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InMemoryIdentityDirectory;
    use crate::models::{AppointmentStatus, AppointmentType};
    use chrono::Utc;

    fn actor(id: &str, role: Role) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            email: None,
            role,
            created_at: None,
        }
    }

    fn appointment(patient_id: Uuid, doctor_id: Uuid) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            scheduled_at: now + chrono::Duration::hours(24),
            duration: 30,
            status: AppointmentStatus::Scheduled,
            appointment_type: AppointmentType::InPerson,
            reason: None,
            notes: None,
            symptoms: vec![],
            cancel_reason: None,
            cancelled_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn policy_with_profiles() -> (AccessPolicy, Uuid, Uuid) {
        let directory = Arc::new(InMemoryIdentityDirectory::new());
        let patient_id = Uuid::new_v4();
        let doctor_id = Uuid::new_v4();
        directory.add_patient(patient_id, "user-patient").await;
        directory.add_doctor(doctor_id, "user-doctor").await;
        (AccessPolicy::new(directory), patient_id, doctor_id)
    }

    #[tokio::test]
    async fn admin_sees_everything() {
        let (policy, patient_id, doctor_id) = policy_with_profiles().await;
        let apt = appointment(patient_id, doctor_id);
        assert!(policy.can_access(&apt, &actor("anyone", Role::Admin)).await.unwrap());
    }

    #[tokio::test]
    async fn patient_only_sees_own_appointments() {
        let (policy, patient_id, doctor_id) = policy_with_profiles().await;
        let own = appointment(patient_id, doctor_id);
        let other = appointment(Uuid::new_v4(), doctor_id);

        let patient = actor("user-patient", Role::Patient);
        assert!(policy.can_access(&own, &patient).await.unwrap());
        assert!(!policy.can_access(&other, &patient).await.unwrap());
    }

    #[tokio::test]
    async fn doctor_without_profile_is_denied_not_errored() {
        let (policy, patient_id, doctor_id) = policy_with_profiles().await;
        let apt = appointment(patient_id, doctor_id);

        let stranger = actor("user-unknown-doctor", Role::Doctor);
        assert!(!policy.can_access(&apt, &stranger).await.unwrap());
    }

    #[tokio::test]
    async fn patient_cannot_book_for_someone_else() {
        let (policy, patient_id, _) = policy_with_profiles().await;
        let patient = actor("user-patient", Role::Patient);

        assert!(policy.can_create(&patient, patient_id).await.unwrap());
        assert!(!policy.can_create(&patient, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn transition_gate_is_role_only() {
        let (policy, _, _) = policy_with_profiles().await;
        // Any doctor passes the gate, even one with no profile on file.
        assert!(policy.can_transition(&actor("user-unknown-doctor", Role::Doctor)));
        assert!(policy.can_transition(&actor("root", Role::Admin)));
        assert!(!policy.can_transition(&actor("user-patient", Role::Patient)));
    }

    #[tokio::test]
    async fn list_scope_narrows_or_empties() {
        let (policy, patient_id, _) = policy_with_profiles().await;

        let mut filter = AppointmentFilter::default();
        let scope = policy
            .scope_list(&actor("user-patient", Role::Patient), &mut filter)
            .await
            .unwrap();
        assert_eq!(scope, ListScope::Visible);
        assert_eq!(filter.patient_id, Some(patient_id));

        let mut filter = AppointmentFilter::default();
        let scope = policy
            .scope_list(&actor("user-nobody", Role::Patient), &mut filter)
            .await
            .unwrap();
        assert_eq!(scope, ListScope::Nothing);
    }
}
