// libs/appointment-cell/src/services/lifecycle.rs
//! Appointment state transitions. Each function either applies the whole
//! transition or returns an error leaving the appointment untouched.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    parse_time, Appointment, AppointmentError, AppointmentStatus, RescheduleAppointmentRequest,
};

fn required(value: Option<&str>, message: &str) -> Result<String, AppointmentError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppointmentError::ValidationError(message.to_string()))
}

/// Fails unless `appointment` may move to `next`.
pub fn ensure_transition(
    appointment: &Appointment,
    next: AppointmentStatus,
    action: &'static str,
) -> Result<(), AppointmentError> {
    if appointment.status.can_transition_to(next) {
        debug!("Appointment {} {} -> {}", appointment.id, appointment.status, next);
        Ok(())
    } else {
        warn!(
            "Refused to move appointment {} from {} to {}",
            appointment.id, appointment.status, next
        );
        Err(AppointmentError::InvalidStatusTransition { status: appointment.status, action })
    }
}

/// Confirmed date and time an approval needs, with the time normalised to
/// "HH:MM".
pub fn approval_slot(
    confirmed_date: Option<NaiveDate>,
    confirmed_time: Option<&str>,
) -> Result<(NaiveDate, String), AppointmentError> {
    let date = confirmed_date
        .ok_or_else(|| AppointmentError::ValidationError("Confirmed date is required".to_string()))?;
    let time = required(confirmed_time, "Confirmed time is required")?;
    let time = parse_time(&time)?.format("%H:%M").to_string();
    Ok((date, time))
}

pub fn approve(
    appointment: &mut Appointment,
    confirmed_date: NaiveDate,
    confirmed_time: String,
    room_id: Option<Uuid>,
    approver: Uuid,
    now: DateTime<Utc>,
) -> Result<(), AppointmentError> {
    ensure_transition(appointment, AppointmentStatus::Approved, "approved")?;

    appointment.status = AppointmentStatus::Approved;
    appointment.confirmed_date = Some(confirmed_date);
    appointment.confirmed_time = Some(confirmed_time);
    appointment.room_id = room_id;
    appointment.approved_by = Some(approver);
    appointment.approval_date = Some(now);
    appointment.updated_at = now;
    Ok(())
}

pub fn reject(
    appointment: &mut Appointment,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), AppointmentError> {
    ensure_transition(appointment, AppointmentStatus::Rejected, "rejected")?;
    let reason = required(reason, "Rejection reason is required")?;

    appointment.status = AppointmentStatus::Rejected;
    appointment.rejection_reason = Some(reason);
    appointment.updated_at = now;
    Ok(())
}

pub fn cancel(
    appointment: &mut Appointment,
    reason: Option<&str>,
    cancelled_by: Uuid,
    now: DateTime<Utc>,
) -> Result<(), AppointmentError> {
    ensure_transition(appointment, AppointmentStatus::Cancelled, "cancelled")?;
    let reason = required(reason, "Cancellation reason is required")?;

    appointment.status = AppointmentStatus::Cancelled;
    appointment.cancellation_reason = Some(reason);
    appointment.cancelled_by = Some(cancelled_by);
    appointment.updated_at = now;
    Ok(())
}

pub fn complete(appointment: &mut Appointment, now: DateTime<Utc>) -> Result<(), AppointmentError> {
    ensure_transition(appointment, AppointmentStatus::Completed, "completed")?;

    appointment.status = AppointmentStatus::Completed;
    appointment.updated_at = now;
    Ok(())
}

/// Moves the appointment to new preferred times and drops whatever had been
/// confirmed.
pub fn reschedule(
    appointment: &mut Appointment,
    request: RescheduleAppointmentRequest,
    now: DateTime<Utc>,
) -> Result<(), AppointmentError> {
    ensure_transition(appointment, AppointmentStatus::Rescheduled, "rescheduled")?;

    let date = request
        .preferred_date
        .ok_or_else(|| AppointmentError::ValidationError("Preferred date is required".to_string()))?;
    let time = required(request.preferred_time.as_deref(), "Preferred time is required")?;
    let time = parse_time(&time)?.format("%H:%M").to_string();
    let alternate_time = match request.alternate_time.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => Some(parse_time(t)?.format("%H:%M").to_string()),
        None => None,
    };

    appointment.status = AppointmentStatus::Rescheduled;
    appointment.preferred_date = date;
    appointment.preferred_time = time;
    appointment.alternate_date = request.alternate_date;
    appointment.alternate_time = alternate_time;
    appointment.confirmed_date = None;
    appointment.confirmed_time = None;
    appointment.room_id = None;
    appointment.session_id = None;
    appointment.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn appointment(status: AppointmentStatus) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Some(Uuid::new_v4()),
            therapist_id: None,
            therapy_type: Some("Nasya".to_string()),
            symptoms: Some("Sinus congestion".to_string()),
            preferred_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            preferred_time: "10:00".to_string(),
            alternate_date: None,
            alternate_time: None,
            status,
            confirmed_date: None,
            confirmed_time: None,
            room_id: None,
            session_id: None,
            approved_by: None,
            approval_date: None,
            rejection_reason: None,
            cancellation_reason: None,
            cancelled_by: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn reject_without_reason_changes_nothing() {
        let mut appt = appointment(AppointmentStatus::Pending);
        let before = appt.clone();

        let result = reject(&mut appt, Some("   "), Utc::now());
        assert_matches!(result, Err(AppointmentError::ValidationError(_)));
        assert_eq!(appt.status, before.status);
        assert_eq!(appt.updated_at, before.updated_at);
        assert!(appt.rejection_reason.is_none());
    }

    #[test]
    fn reject_keeps_confirmed_fields() {
        let mut appt = appointment(AppointmentStatus::Rescheduled);
        appt.confirmed_time = Some("11:00".to_string());

        reject(&mut appt, Some("Doctor on leave"), Utc::now()).unwrap();
        assert_eq!(appt.status, AppointmentStatus::Rejected);
        assert_eq!(appt.confirmed_time.as_deref(), Some("11:00"));
    }

    #[test]
    fn approval_needs_date_and_time() {
        assert_matches!(
            approval_slot(None, Some("10:00")),
            Err(AppointmentError::ValidationError(_))
        );
        assert_matches!(
            approval_slot(NaiveDate::from_ymd_opt(2024, 1, 1), None),
            Err(AppointmentError::ValidationError(_))
        );
        let (_, time) = approval_slot(NaiveDate::from_ymd_opt(2024, 1, 1), Some(" 10:30 ")).unwrap();
        assert_eq!(time, "10:30");
    }

    #[test]
    fn approve_records_approver() {
        let mut appt = appointment(AppointmentStatus::Pending);
        let approver = Uuid::new_v4();
        let now = Utc::now();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        approve(&mut appt, date, "09:00".to_string(), None, approver, now).unwrap();
        assert_eq!(appt.status, AppointmentStatus::Approved);
        assert_eq!(appt.approved_by, Some(approver));
        assert_eq!(appt.approval_date, Some(now));
        assert_eq!(appt.confirmed_date, Some(date));
    }

    #[test]
    fn cancel_is_refused_from_terminal_states() {
        for status in [AppointmentStatus::Completed, AppointmentStatus::Rejected, AppointmentStatus::Cancelled] {
            let mut appt = appointment(status);
            let result = cancel(&mut appt, Some("Travelling"), Uuid::new_v4(), Utc::now());
            assert_matches!(result, Err(AppointmentError::InvalidStatusTransition { .. }));
        }
    }

    #[test]
    fn cancel_requires_reason() {
        let mut appt = appointment(AppointmentStatus::Approved);
        assert_matches!(
            cancel(&mut appt, None, Uuid::new_v4(), Utc::now()),
            Err(AppointmentError::ValidationError(_))
        );
        assert_eq!(appt.status, AppointmentStatus::Approved);
    }

    #[test]
    fn complete_only_from_approved() {
        let mut pending = appointment(AppointmentStatus::Pending);
        assert!(complete(&mut pending, Utc::now()).is_err());

        let mut approved = appointment(AppointmentStatus::Approved);
        complete(&mut approved, Utc::now()).unwrap();
        assert_eq!(approved.status, AppointmentStatus::Completed);
    }

    #[test]
    fn reschedule_clears_confirmation() {
        let mut appt = appointment(AppointmentStatus::Approved);
        appt.confirmed_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        appt.confirmed_time = Some("10:00".to_string());
        appt.room_id = Some(Uuid::new_v4());
        appt.session_id = Some(Uuid::new_v4());

        let request = RescheduleAppointmentRequest {
            preferred_date: NaiveDate::from_ymd_opt(2024, 1, 8),
            preferred_time: Some("14:00".to_string()),
            alternate_date: None,
            alternate_time: None,
        };
        reschedule(&mut appt, request, Utc::now()).unwrap();

        assert_eq!(appt.status, AppointmentStatus::Rescheduled);
        assert_eq!(appt.preferred_time, "14:00");
        assert!(appt.confirmed_date.is_none());
        assert!(appt.confirmed_time.is_none());
        assert!(appt.room_id.is_none());
        assert!(appt.session_id.is_none());
    }

    #[test]
    fn rescheduled_appointment_cannot_be_rescheduled_again() {
        let mut appt = appointment(AppointmentStatus::Rescheduled);
        let request = RescheduleAppointmentRequest {
            preferred_date: NaiveDate::from_ymd_opt(2024, 1, 8),
            preferred_time: Some("14:00".to_string()),
            ..Default::default()
        };
        assert_matches!(
            reschedule(&mut appt, request, Utc::now()),
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
    }
}
