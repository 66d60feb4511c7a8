// libs/appointment-cell/src/services/reminders.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notification_cell::{Channel, DueReminder, NotificationError, NotificationType, ReminderSource};
use scheduling_cell::SchedulingService;

use crate::services::booking::AppointmentService;

/// Approved appointments about to start.
pub struct AppointmentReminders {
    appointments: Arc<AppointmentService>,
}

impl AppointmentReminders {
    pub fn new(appointments: Arc<AppointmentService>) -> Self {
        Self { appointments }
    }
}

#[async_trait]
impl ReminderSource for AppointmentReminders {
    fn name(&self) -> &'static str {
        "appointments"
    }

    async fn due_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DueReminder>, NotificationError> {
        let due = self
            .appointments
            .approved_starting_between(from, until)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(due
            .into_iter()
            .map(|(appointment, starts_at)| DueReminder {
                user_id: appointment.patient_id,
                reference_id: appointment.id,
                starts_at,
                notification_type: NotificationType::AppointmentReminder,
                title: "Upcoming appointment".to_string(),
                message: format!(
                    "Reminder: your appointment is on {} at {}.",
                    appointment
                        .confirmed_date
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                    appointment.confirmed_time.unwrap_or_default()
                ),
                channel: Channel::Email,
            })
            .collect())
    }
}

/// Scheduled therapy sessions about to start.
pub struct SessionReminders {
    scheduling: Arc<SchedulingService>,
}

impl SessionReminders {
    pub fn new(scheduling: Arc<SchedulingService>) -> Self {
        Self { scheduling }
    }
}

#[async_trait]
impl ReminderSource for SessionReminders {
    fn name(&self) -> &'static str {
        "sessions"
    }

    async fn due_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DueReminder>, NotificationError> {
        let offset = self.scheduling.clinic_offset();
        let sessions = self
            .scheduling
            .sessions_starting_between(from, until)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(sessions
            .into_iter()
            .map(|session| DueReminder {
                user_id: session.patient_id,
                reference_id: session.id,
                starts_at: session.start_time,
                notification_type: NotificationType::PreTherapy,
                title: format!("Preparing for {}", session.therapy_type),
                message: format!(
                    "Your {} session starts {}.",
                    session.therapy_type,
                    session.start_time.with_timezone(&offset).format("%d %b %Y at %H:%M")
                ),
                channel: Channel::Email,
            })
            .collect())
    }
}
