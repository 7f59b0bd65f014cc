// src/modules/clinical.rs

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::{
    error::PortalError,
    executor::CommandExecutor,
    models::{
        Appointment, AppointmentStatus, CheckInAnswer, NewAppointment, PlanStatus, TimeSlot,
        TreatmentPlan,
    },
};

/// Appointments, the available-slot index, and treatment plans. Commands are
/// the only mutation path; all reads are cloned snapshots.
#[derive(Clone)]
pub struct ClinicalModule {
    state: Arc<Mutex<ClinicalState>>,
    executor: CommandExecutor,
}

#[derive(Default)]
struct ClinicalState {
    appointments: Vec<Appointment>,
    slots: Vec<TimeSlot>,
    plans: Vec<TreatmentPlan>,
}

fn new_confirmation_code() -> String {
    const CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

fn is_telehealth(appointment_type: &str) -> bool {
    appointment_type.eq_ignore_ascii_case("telehealth")
}

impl ClinicalModule {
    pub fn new(latency: std::time::Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClinicalState::default())),
            executor: CommandExecutor::new(latency),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClinicalState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /* ============================================================
       Snapshots / module flags
       ============================================================ */

    pub fn appointments(&self) -> Vec<Appointment> {
        self.lock().appointments.clone()
    }

    pub fn available_slots(&self) -> Vec<TimeSlot> {
        self.lock().slots.clone()
    }

    pub fn treatment_plans(&self) -> Vec<TreatmentPlan> {
        self.lock().plans.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.executor.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.executor.last_error()
    }

    /* ============================================================
       Seeding (mock data only; not a sanctioned UI path)
       ============================================================ */

    pub fn seed(
        &self,
        appointments: Vec<Appointment>,
        slots: Vec<TimeSlot>,
        plans: Vec<TreatmentPlan>,
    ) {
        let mut state = self.lock();
        state.appointments = appointments;
        state.slots = slots;
        state.plans = plans;
    }

    /* ============================================================
       book_appointment
       ============================================================ */

    pub async fn book_appointment(&self, req: NewAppointment) -> Result<Appointment, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                if req.appointment_type.trim().is_empty() {
                    return Err(PortalError::validation("appointment type is required"));
                }
                if req.reason.trim().is_empty() {
                    return Err(PortalError::validation("reason for visit is required"));
                }
                if req.end_at <= req.start_at {
                    return Err(PortalError::validation("end_at must be > start_at"));
                }

                let code = new_confirmation_code();
                let appointment = Appointment {
                    id: Uuid::new_v4(),
                    patient_id: req.patient_id,
                    provider_id: req.provider_id,
                    office_id: req.office_id,
                    start_at: req.start_at,
                    end_at: req.end_at,
                    appointment_type: req.appointment_type.clone(),
                    reason: req.reason.clone(),
                    status: AppointmentStatus::Confirmed,
                    telehealth_link: is_telehealth(&req.appointment_type)
                        .then(|| format!("https://visit.portal.local/room/{code}")),
                    confirmation_code: code,
                    check_in_answers: None,
                    cancelled_at: None,
                    cancel_reason: None,
                };

                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                consume_slot(&mut state.slots, req.provider_id, req.start_at);
                state.appointments.push(appointment.clone());
                Ok(appointment)
            })
            .await
    }

    /* ============================================================
       cancel_appointment
       ============================================================ */

    pub async fn cancel_appointment(
        &self,
        id: Uuid,
        reason: &str,
    ) -> Result<Appointment, PortalError> {
        let state = Arc::clone(&self.state);
        let reason = reason.to_string();
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let appointment = state
                    .appointments
                    .iter_mut()
                    .find(|a| a.id == id)
                    .ok_or_else(|| PortalError::not_found("appointment"))?;

                match appointment.status {
                    AppointmentStatus::Confirmed | AppointmentStatus::Pending => {
                        appointment.status = AppointmentStatus::Cancelled;
                        appointment.cancelled_at = Some(Utc::now());
                        appointment.cancel_reason = Some(reason);
                    }
                    // Already terminal (or in-office): leave untouched. The UI
                    // treats a repeat cancel as idempotent.
                    other => {
                        tracing::debug!(appointment_id = %id, status = ?other, "cancel ignored");
                    }
                }
                Ok(appointment.clone())
            })
            .await
    }

    /* ============================================================
       reschedule_appointment
       ============================================================ */

    pub async fn reschedule_appointment(
        &self,
        id: Uuid,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Result<Appointment, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                if new_end <= new_start {
                    return Err(PortalError::validation("end_at must be > start_at"));
                }

                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let provider_id = {
                    let appointment = state
                        .appointments
                        .iter_mut()
                        .find(|a| a.id == id)
                        .ok_or_else(|| PortalError::not_found("appointment"))?;

                    if appointment.status == AppointmentStatus::Cancelled {
                        return Err(PortalError::validation(
                            "Cannot reschedule a cancelled appointment",
                        ));
                    }

                    appointment.start_at = new_start;
                    appointment.end_at = new_end;
                    appointment.status = AppointmentStatus::Confirmed;
                    appointment.provider_id
                };

                // The new slot is consumed; the old one is not restored.
                consume_slot(&mut state.slots, provider_id, new_start);

                let appointment = state
                    .appointments
                    .iter()
                    .find(|a| a.id == id)
                    .cloned()
                    .ok_or_else(|| PortalError::not_found("appointment"))?;
                Ok(appointment)
            })
            .await
    }

    /* ============================================================
       check_in
       ============================================================ */

    pub async fn check_in(
        &self,
        id: Uuid,
        answers: Vec<CheckInAnswer>,
    ) -> Result<Appointment, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let appointment = state
                    .appointments
                    .iter_mut()
                    .find(|a| a.id == id)
                    .ok_or_else(|| PortalError::not_found("appointment"))?;

                if appointment.status != AppointmentStatus::Confirmed {
                    return Err(PortalError::validation(
                        "Only a confirmed appointment can be checked in",
                    ));
                }
                appointment.status = AppointmentStatus::CheckedIn;
                appointment.check_in_answers = Some(answers);
                Ok(appointment.clone())
            })
            .await
    }

    /* ============================================================
       respond_to_treatment_plan
       ============================================================ */

    pub async fn respond_to_treatment_plan(
        &self,
        id: Uuid,
        accept: bool,
    ) -> Result<TreatmentPlan, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let plan = state
                    .plans
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| PortalError::not_found("treatment plan"))?;

                if plan.status != PlanStatus::Proposed {
                    return Err(PortalError::validation(
                        "Treatment plan has already been responded to",
                    ));
                }
                plan.status = if accept {
                    PlanStatus::Accepted
                } else {
                    PlanStatus::Rejected
                };
                Ok(plan.clone())
            })
            .await
    }
}

/// Removes the slot matching (provider, start). A miss is a silent no-op:
/// the booking still commits, only the index is stale.
fn consume_slot(slots: &mut Vec<TimeSlot>, provider_id: Uuid, start_at: DateTime<Utc>) {
    let before = slots.len();
    slots.retain(|s| !(s.provider_id == provider_id && s.start_at == start_at));
    if slots.len() == before {
        tracing::debug!(%provider_id, %start_at, "no matching slot to consume");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, day, hour, 0, 0).unwrap()
    }

    fn module_with_slot(provider_id: Uuid, start: DateTime<Utc>) -> ClinicalModule {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        module.seed(
            vec![],
            vec![TimeSlot {
                slot_id: Uuid::new_v4(),
                provider_id,
                office_id: Uuid::new_v4(),
                start_at: start,
                end_at: start + Duration::minutes(30),
            }],
            vec![],
        );
        module
    }

    fn booking(provider_id: Uuid, start: DateTime<Utc>) -> NewAppointment {
        NewAppointment {
            patient_id: Uuid::new_v4(),
            provider_id,
            office_id: Uuid::new_v4(),
            start_at: start,
            end_at: start + Duration::minutes(30),
            appointment_type: "Checkup".into(),
            reason: "routine cleaning".into(),
        }
    }

    #[tokio::test]
    async fn test_book_confirms_and_consumes_slot() {
        let provider_id = Uuid::new_v4();
        let start = at(10, 9);
        let module = module_with_slot(provider_id, start);

        let appt = module.book_appointment(booking(provider_id, start)).await.unwrap();
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(appt.confirmation_code.len(), 6);
        assert!(appt.telehealth_link.is_none());
        assert!(module.available_slots().is_empty());
        assert_eq!(module.appointments().len(), 1);
    }

    #[tokio::test]
    async fn test_book_without_matching_slot_still_commits() {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        let appt = module
            .book_appointment(booking(Uuid::new_v4(), at(10, 9)))
            .await
            .unwrap();
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(module.appointments().len(), 1);
    }

    #[tokio::test]
    async fn test_book_telehealth_gets_link() {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        let mut req = booking(Uuid::new_v4(), at(10, 9));
        req.appointment_type = "Telehealth".into();
        let appt = module.book_appointment(req).await.unwrap();
        let link = appt.telehealth_link.unwrap();
        assert!(link.contains(&appt.confirmation_code));
    }

    #[tokio::test]
    async fn test_book_rejects_empty_reason() {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        let mut req = booking(Uuid::new_v4(), at(10, 9));
        req.reason = "  ".into();
        let err = module.book_appointment(req).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(module.last_error().as_deref(), Some("reason for visit is required"));
    }

    #[tokio::test]
    async fn test_cancel_from_confirmed() {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        let appt = module
            .book_appointment(booking(Uuid::new_v4(), at(10, 9)))
            .await
            .unwrap();

        let cancelled = module.cancel_appointment(appt.id, "conflict").await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("conflict"));
        assert!(cancelled.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_twice_is_a_noop() {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        let appt = module
            .book_appointment(booking(Uuid::new_v4(), at(10, 9)))
            .await
            .unwrap();

        let first = module.cancel_appointment(appt.id, "conflict").await.unwrap();
        let second = module.cancel_appointment(appt.id, "again").await.unwrap();
        assert_eq!(second.status, AppointmentStatus::Cancelled);
        // Metadata from the first cancel survives untouched.
        assert_eq!(second.cancel_reason.as_deref(), Some("conflict"));
        assert_eq!(second.cancelled_at, first.cancelled_at);
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_fails() {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        let err = module.cancel_appointment(Uuid::new_v4(), "x").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_reschedule_preserves_identity_and_consumes_new_slot() {
        let provider_id = Uuid::new_v4();
        let module = module_with_slot(provider_id, at(20, 14));
        let appt = module
            .book_appointment(booking(provider_id, at(10, 9)))
            .await
            .unwrap();

        let new_start = at(20, 14);
        let moved = module
            .reschedule_appointment(appt.id, new_start, new_start + Duration::minutes(30))
            .await
            .unwrap();

        assert_eq!(moved.id, appt.id);
        assert_eq!(moved.start_at, new_start);
        assert_eq!(moved.status, AppointmentStatus::Confirmed);
        assert!(module.available_slots().is_empty());
        assert_eq!(module.appointments().len(), 1);
    }

    #[tokio::test]
    async fn test_reschedule_cancelled_fails() {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        let appt = module
            .book_appointment(booking(Uuid::new_v4(), at(10, 9)))
            .await
            .unwrap();
        module.cancel_appointment(appt.id, "conflict").await.unwrap();

        let err = module
            .reschedule_appointment(appt.id, at(20, 14), at(20, 15))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_check_in_requires_confirmed() {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        let appt = module
            .book_appointment(booking(Uuid::new_v4(), at(10, 9)))
            .await
            .unwrap();

        let answers = vec![CheckInAnswer {
            question: "Any changes to your medications?".into(),
            answer: "No".into(),
        }];
        let checked = module.check_in(appt.id, answers).await.unwrap();
        assert_eq!(checked.status, AppointmentStatus::CheckedIn);
        assert_eq!(checked.check_in_answers.unwrap().len(), 1);

        // Already checked in.
        assert!(module.check_in(appt.id, vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_treatment_plan_single_response() {
        let module = ClinicalModule::new(std::time::Duration::ZERO);
        let plan_id = Uuid::new_v4();
        module.seed(
            vec![],
            vec![],
            vec![TreatmentPlan {
                id: plan_id,
                patient_id: Uuid::new_v4(),
                title: "Crown replacement".into(),
                status: PlanStatus::Proposed,
                procedures: vec![],
                proposed_on: at(1, 0).date_naive(),
            }],
        );

        let accepted = module.respond_to_treatment_plan(plan_id, true).await.unwrap();
        assert_eq!(accepted.status, PlanStatus::Accepted);
        assert!(module.respond_to_treatment_plan(plan_id, false).await.is_err());
    }
}
