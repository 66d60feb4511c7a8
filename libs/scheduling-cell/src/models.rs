// libs/scheduling-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{Document, StoreError};
use shared_models::error::AppError;

// ==============================================================================
// ROOM & SLOT MODELS
// ==============================================================================

/// Weekly recurring availability window of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub day_of_week: u8, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: String, // "HH:MM"
    pub end_time: String,
    pub max_concurrent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub room_type: String,
    pub capacity: u32,
    pub is_available: bool,
    pub slots: Vec<Slot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Room {
    const COLLECTION: &'static str = "rooms";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub room_type: String,
    pub capacity: Option<u32>,
    pub is_available: Option<bool>,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    pub room_type: Option<String>,
    pub capacity: Option<u32>,
    pub is_available: Option<bool>,
    pub slots: Option<Vec<Slot>>,
}

// ==============================================================================
// THERAPY SESSION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
    NoShow,
}

impl SessionStatus {
    /// Statuses a session may move to from `self`.
    pub fn valid_transitions(&self) -> &'static [SessionStatus] {
        match self {
            SessionStatus::Scheduled => &[
                SessionStatus::Ongoing,
                SessionStatus::Cancelled,
                SessionStatus::NoShow,
            ],
            SessionStatus::Ongoing => &[SessionStatus::Completed, SessionStatus::Cancelled],
            // Terminal states
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Whether a session in this status holds room capacity.
    pub fn occupies_room(&self) -> bool {
        *self != SessionStatus::Cancelled
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Scheduled => write!(f, "scheduled"),
            SessionStatus::Ongoing => write!(f, "ongoing"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
            SessionStatus::NoShow => write!(f, "no-show"),
        }
    }
}

/// A booked therapy session occupying one unit of a room slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapySession {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub room_id: Uuid,
    pub therapy_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub appointment_id: Option<Uuid>,
    pub booked_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for TherapySession {
    const COLLECTION: &'static str = "sessions";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSessionRequest {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub room_id: Uuid,
    pub therapy_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSessionRequest {
    pub status: Option<SessionStatus>,
    pub notes: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSearchQuery {
    pub room_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub practitioner_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Outcome of a booking check as reported to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDecision {
    pub ok: bool,
    pub slot: Option<Slot>,
    pub reason: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room not available")]
    RoomUnavailable,

    #[error("No slot for requested time")]
    NoSlot,

    #[error("Room capacity full")]
    CapacityFull,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Session cannot move from {from} to {to}")]
    InvalidStatusTransition { from: SessionStatus, to: SessionStatus },

    #[error("Room has active sessions and cannot be deleted")]
    RoomInUse,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl SchedulingError {
    /// Whether this error is a booking refusal rather than a fault.
    pub fn is_booking_refusal(&self) -> bool {
        matches!(
            self,
            SchedulingError::RoomNotFound
                | SchedulingError::RoomUnavailable
                | SchedulingError::NoSlot
                | SchedulingError::CapacityFull
        )
    }
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        SchedulingError::DatabaseError(err.to_string())
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::RoomNotFound | SchedulingError::SessionNotFound => {
                AppError::NotFound(err.to_string())
            }
            SchedulingError::RoomUnavailable
            | SchedulingError::NoSlot
            | SchedulingError::CapacityFull
            | SchedulingError::RoomInUse
            | SchedulingError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            SchedulingError::InvalidTimeRange(_)
            | SchedulingError::InvalidSlot(_)
            | SchedulingError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            SchedulingError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
