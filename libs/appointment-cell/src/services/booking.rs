// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use notification_cell::{Channel, CreateNotificationRequest, NotificationService, NotificationType};
use scheduling_cell::{BookSessionRequest, SchedulingService, SessionStatus, UpdateSessionRequest};
use shared_database::{Collection, DocumentStore, Filter};
use shared_models::auth::User;

use crate::models::{
    local_instant, parse_time, Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    ApproveAppointmentRequest, CancelAppointmentRequest, CreateAppointmentRequest,
    RejectAppointmentRequest, RescheduleAppointmentRequest, DEFAULT_SESSION_MINUTES,
};
use crate::services::lifecycle;

pub struct AppointmentService {
    appointments: Arc<dyn Collection<Appointment>>,
    scheduling: Arc<SchedulingService>,
    notifications: Arc<NotificationService>,
    // read-modify-write of an appointment happens under this lock
    writes: Mutex<()>,
}

impl AppointmentService {
    pub fn new(
        store: &DocumentStore,
        scheduling: Arc<SchedulingService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            appointments: store.collection::<Appointment>(),
            scheduling,
            notifications,
            writes: Mutex::new(()),
        }
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// Newest first.
    pub async fn list(&self, query: &AppointmentSearchQuery) -> Result<Vec<Appointment>, AppointmentError> {
        let mut filter = Filter::new();
        if let Some(patient_id) = query.patient_id {
            filter = filter.eq("patient_id", patient_id);
        }
        if let Some(doctor_id) = query.doctor_id {
            filter = filter.eq("doctor_id", doctor_id);
        }
        if let Some(therapist_id) = query.therapist_id {
            filter = filter.eq("therapist_id", therapist_id);
        }
        if let Some(status) = query.status {
            filter = filter.eq("status", status);
        }

        let mut appointments = self.appointments.find(&filter).await?;
        appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(appointments)
    }

    /// Approved appointments whose confirmed start falls within `[from, until)`.
    /// Approved appointments with their confirmed start instant.
    pub async fn approved_starting_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<(Appointment, DateTime<Utc>)>, AppointmentError> {
        let offset = self.scheduling.clinic_offset();
        let filter = Filter::new().eq("status", AppointmentStatus::Approved);

        Ok(self
            .appointments
            .find(&filter)
            .await?
            .into_iter()
            .filter_map(|a| {
                let start = a.confirmed_start(offset)?;
                (start >= from && start < until).then_some((a, start))
            })
            .collect())
    }

    // ==========================================================================
    // WORKFLOW
    // ==========================================================================

    /// Submits a new appointment request. Patients always book for
    /// themselves; staff must name the patient.
    pub async fn create(
        &self,
        request: CreateAppointmentRequest,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = if caller.is_staff() {
            request
                .patient_id
                .ok_or_else(|| AppointmentError::ValidationError("patientId is required".to_string()))?
        } else {
            if request.patient_id.is_some_and(|id| id != caller.id) {
                return Err(AppointmentError::Unauthorized);
            }
            caller.id
        };

        if request.doctor_id.is_some() && request.therapist_id.is_some() {
            return Err(AppointmentError::ValidationError(
                "Assign either a doctor or a therapist, not both".to_string(),
            ));
        }

        let preferred_date = request
            .preferred_date
            .ok_or_else(|| AppointmentError::ValidationError("Preferred date is required".to_string()))?;
        let preferred_time = request
            .preferred_time
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppointmentError::ValidationError("Preferred time is required".to_string()))?;
        let preferred_time = parse_time(preferred_time)?.format("%H:%M").to_string();
        let alternate_time = match request.alternate_time.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Some(parse_time(t)?.format("%H:%M").to_string()),
            None => None,
        };

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: request.doctor_id,
            therapist_id: request.therapist_id,
            therapy_type: request.therapy_type.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            symptoms: request.symptoms,
            preferred_date,
            preferred_time,
            alternate_date: request.alternate_date,
            alternate_time,
            status: AppointmentStatus::Pending,
            confirmed_date: None,
            confirmed_time: None,
            room_id: None,
            session_id: None,
            approved_by: None,
            approval_date: None,
            rejection_reason: None,
            cancellation_reason: None,
            cancelled_by: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        let appointment = self.appointments.insert(appointment).await?;
        info!(
            "Appointment {} requested by patient {} for {} {}",
            appointment.id, appointment.patient_id, appointment.preferred_date, appointment.preferred_time
        );
        Ok(appointment)
    }

    /// Approves an appointment. With a room, a session is booked for the
    /// confirmed time first; a refused booking leaves the appointment as it
    /// was.
    #[instrument(skip(self, request), fields(appointment_id = %appointment_id))]
    pub async fn approve(
        &self,
        appointment_id: Uuid,
        request: ApproveAppointmentRequest,
        approver: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = {
            let _guard = self.writes.lock().await;
            let mut appointment = self.get(appointment_id).await?;
            lifecycle::ensure_transition(&appointment, AppointmentStatus::Approved, "approved")?;
            let (date, time) =
                lifecycle::approval_slot(request.confirmed_date, request.confirmed_time.as_deref())?;

            let session_id = match request.room_id {
                Some(room_id) => Some(
                    self.book_confirmed_session(&appointment, room_id, date, &time, request.duration_minutes, approver)
                        .await?,
                ),
                None => None,
            };

            lifecycle::approve(&mut appointment, date, time, request.room_id, approver, Utc::now())?;
            appointment.session_id = session_id;

            match self.appointments.update(appointment).await {
                Ok(appointment) => appointment,
                Err(e) => {
                    if let Some(session_id) = session_id {
                        if let Err(undo) = self.scheduling.delete_session(session_id).await {
                            warn!("Could not release session {}: {}", session_id, undo);
                        }
                    }
                    return Err(e.into());
                }
            }
        };

        info!("Appointment {} approved by {}", appointment.id, approver);
        let when = confirmed_label(&appointment);
        self.notify_patient(
            &appointment,
            "Appointment approved",
            format!("Your appointment is confirmed for {}.", when),
        )
        .await;
        Ok(appointment)
    }

    pub async fn reject(
        &self,
        appointment_id: Uuid,
        request: RejectAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = {
            let _guard = self.writes.lock().await;
            let mut appointment = self.get(appointment_id).await?;
            lifecycle::reject(&mut appointment, request.rejection_reason.as_deref(), Utc::now())?;
            self.appointments.update(appointment).await?
        };

        info!("Appointment {} rejected", appointment.id);
        let reason = appointment.rejection_reason.clone().unwrap_or_default();
        self.notify_patient(
            &appointment,
            "Appointment request declined",
            format!("Your appointment request could not be accepted: {}", reason),
        )
        .await;
        Ok(appointment)
    }

    /// Cancels the appointment and frees the room session booked for it.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let (appointment, released) = {
            let _guard = self.writes.lock().await;
            let mut appointment = self.get(appointment_id).await?;
            ensure_participant(&appointment, caller)?;

            lifecycle::cancel(&mut appointment, request.cancellation_reason.as_deref(), caller.id, Utc::now())?;
            let released = appointment.session_id;
            (self.appointments.update(appointment).await?, released)
        };

        info!("Appointment {} cancelled by {}", appointment.id, caller.id);
        if let Some(session_id) = released {
            self.cancel_session(session_id).await;
        }
        let reason = appointment.cancellation_reason.clone().unwrap_or_default();
        self.notify_patient(
            &appointment,
            "Appointment cancelled",
            format!("Your appointment has been cancelled: {}", reason),
        )
        .await;
        Ok(appointment)
    }

    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = {
            let _guard = self.writes.lock().await;
            let mut appointment = self.get(appointment_id).await?;
            lifecycle::complete(&mut appointment, Utc::now())?;
            self.appointments.update(appointment).await?
        };

        info!("Appointment {} completed", appointment.id);
        self.notify_patient(
            &appointment,
            "Appointment completed",
            "Thank you for visiting. Your appointment is now complete.".to_string(),
        )
        .await;
        Ok(appointment)
    }

    /// Asks for new times. Any confirmation and booked session is dropped;
    /// the appointment awaits approval again.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let (appointment, released) = {
            let _guard = self.writes.lock().await;
            let mut appointment = self.get(appointment_id).await?;
            ensure_participant(&appointment, caller)?;

            let released = appointment.session_id;
            lifecycle::reschedule(&mut appointment, request, Utc::now())?;
            (self.appointments.update(appointment).await?, released)
        };

        info!("Appointment {} rescheduled", appointment.id);
        if let Some(session_id) = released {
            self.cancel_session(session_id).await;
        }
        self.notify_patient(
            &appointment,
            "Appointment rescheduled",
            format!(
                "Your appointment request now asks for {} at {}. You will be notified once it is confirmed.",
                appointment.preferred_date, appointment.preferred_time
            ),
        )
        .await;
        Ok(appointment)
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn book_confirmed_session(
        &self,
        appointment: &Appointment,
        room_id: Uuid,
        date: NaiveDate,
        time: &str,
        duration_minutes: Option<u32>,
        booked_by: Uuid,
    ) -> Result<Uuid, AppointmentError> {
        let minutes = duration_minutes.unwrap_or(DEFAULT_SESSION_MINUTES);
        if minutes == 0 {
            return Err(AppointmentError::ValidationError(
                "Duration must be at least one minute".to_string(),
            ));
        }

        let start = local_instant(date, parse_time(time)?, self.scheduling.clinic_offset()).ok_or_else(|| {
            AppointmentError::ValidationError(format!("{} {} is not a valid clinic time", date, time))
        })?;
        let end = start + Duration::minutes(i64::from(minutes));

        let session = self
            .scheduling
            .book_session(
                BookSessionRequest {
                    patient_id: appointment.patient_id,
                    practitioner_id: appointment.practitioner_id().unwrap_or(booked_by),
                    room_id,
                    therapy_type: appointment
                        .therapy_type
                        .clone()
                        .unwrap_or_else(|| "Consultation".to_string()),
                    start_time: start,
                    end_time: end,
                    notes: appointment.symptoms.clone(),
                    appointment_id: Some(appointment.id),
                },
                booked_by,
            )
            .await?;
        Ok(session.id)
    }

    async fn cancel_session(&self, session_id: Uuid) {
        let update = UpdateSessionRequest { status: Some(SessionStatus::Cancelled), ..Default::default() };
        if let Err(e) = self.scheduling.update_session(session_id, update).await {
            warn!("Could not cancel session {}: {}", session_id, e);
        }
    }

    /// Tells the patient about a transition. Delivery problems are recorded
    /// on the notification and never undo the transition.
    async fn notify_patient(&self, appointment: &Appointment, title: &str, message: String) {
        let request = CreateNotificationRequest {
            user_id: appointment.patient_id,
            notification_type: NotificationType::General,
            title: title.to_string(),
            message,
            channel: Channel::Email,
            reference_id: Some(appointment.id),
        };

        if let Err(e) = self.notifications.notify(request).await {
            warn!("Notification for appointment {} failed: {}", appointment.id, e);
        }
    }
}

fn ensure_participant(appointment: &Appointment, caller: &User) -> Result<(), AppointmentError> {
    if caller.is_staff() || appointment.patient_id == caller.id {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized)
    }
}

fn confirmed_label(appointment: &Appointment) -> String {
    match (&appointment.confirmed_date, &appointment.confirmed_time) {
        (Some(date), Some(time)) => format!("{} at {}", date, time),
        _ => format!("{} at {}", appointment.preferred_date, appointment.preferred_time),
    }
}
