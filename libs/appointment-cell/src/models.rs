// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use scheduling_cell::SchedulingError;
use shared_database::{Document, StoreError};
use shared_models::error::AppError;

/// Length of the session booked on approval when none is given.
pub const DEFAULT_SESSION_MINUTES: u32 = 60;

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Pending => &[Approved, Rejected, Cancelled, Rescheduled],
            Rescheduled => &[Approved, Rejected, Cancelled],
            Approved => &[Completed, Cancelled, Rescheduled],
            // Terminal states
            Rejected | Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
        };
        f.write_str(name)
    }
}

/// A patient's request for therapy, assigned to either a doctor or a
/// therapist. Confirmed fields are only set while approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub therapist_id: Option<Uuid>,
    pub therapy_type: Option<String>,
    pub symptoms: Option<String>,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub alternate_date: Option<NaiveDate>,
    pub alternate_time: Option<String>,
    pub status: AppointmentStatus,
    pub confirmed_date: Option<NaiveDate>,
    pub confirmed_time: Option<String>,
    pub room_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub approval_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Appointment {
    const COLLECTION: &'static str = "appointments";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Appointment {
    /// The doctor or therapist the appointment is with.
    pub fn practitioner_id(&self) -> Option<Uuid> {
        self.doctor_id.or(self.therapist_id)
    }

    /// Confirmed start as an instant, reading the confirmed date and time as
    /// clinic-local.
    pub fn confirmed_start(&self, offset: FixedOffset) -> Option<DateTime<Utc>> {
        let date = self.confirmed_date?;
        let time = parse_time(self.confirmed_time.as_deref()?).ok()?;
        local_instant(date, time, offset)
    }
}

/// Parses an "HH:MM" appointment time.
pub fn parse_time(value: &str) -> Result<NaiveTime, AppointmentError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| AppointmentError::ValidationError(format!("'{}' is not a valid HH:MM time", value)))
}

pub fn local_instant(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    #[serde(alias = "patient_id")]
    pub patient_id: Option<Uuid>,
    #[serde(alias = "doctor_id")]
    pub doctor_id: Option<Uuid>,
    #[serde(alias = "therapist_id")]
    pub therapist_id: Option<Uuid>,
    #[serde(alias = "therapy_type")]
    pub therapy_type: Option<String>,
    pub symptoms: Option<String>,
    #[serde(alias = "preferred_date")]
    pub preferred_date: Option<NaiveDate>,
    #[serde(alias = "preferred_time")]
    pub preferred_time: Option<String>,
    #[serde(alias = "alternate_date")]
    pub alternate_date: Option<NaiveDate>,
    #[serde(alias = "alternate_time")]
    pub alternate_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveAppointmentRequest {
    #[serde(alias = "confirmed_date")]
    pub confirmed_date: Option<NaiveDate>,
    #[serde(alias = "confirmed_time")]
    pub confirmed_time: Option<String>,
    #[serde(alias = "room_id")]
    pub room_id: Option<Uuid>,
    #[serde(alias = "duration_minutes")]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectAppointmentRequest {
    #[serde(alias = "rejection_reason", alias = "reason")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAppointmentRequest {
    #[serde(alias = "cancellation_reason", alias = "reason")]
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleAppointmentRequest {
    #[serde(alias = "preferred_date")]
    pub preferred_date: Option<NaiveDate>,
    #[serde(alias = "preferred_time")]
    pub preferred_time: Option<String>,
    #[serde(alias = "alternate_date")]
    pub alternate_date: Option<NaiveDate>,
    #[serde(alias = "alternate_time")]
    pub alternate_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub therapist_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("A {status} appointment cannot be {action}")]
    InvalidStatusTransition {
        status: AppointmentStatus,
        action: &'static str,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error(transparent)]
    Booking(#[from] SchedulingError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        AppointmentError::DatabaseError(err.to_string())
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::Booking(inner) => AppError::from(inner),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
