// libs/procedure-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::{Document, StoreError};
use shared_models::error::AppError;

// ==============================================================================
// STEP MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::InProgress => write!(f, "in-progress"),
            StepStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One stage of a procedure. While running, `started_at` marks when the
/// current run began; `elapsed_seconds` holds time from earlier runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub description: Option<String>,
    pub status: StepStatus,
    pub elapsed_seconds: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Step {
    pub fn new(name: &str, description: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            description: description.map(str::to_string),
            status: StepStatus::Pending,
            elapsed_seconds: 0,
            started_at: None,
            completed_at: None,
            notes: None,
        }
    }

    /// Accumulated time including the current run, in whole seconds.
    pub fn live_elapsed(&self, now: DateTime<Utc>) -> u64 {
        let running = self
            .started_at
            .filter(|_| self.status == StepStatus::InProgress)
            .map(|started| (now - started).num_seconds().max(0) as u64)
            .unwrap_or(0);
        self.elapsed_seconds + running
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    pub name: String,
    pub description: Option<String>,
}

// ==============================================================================
// VITALS
// ==============================================================================

/// Free-text vitals reading. Values are recorded as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub pulse: Option<String>,
    pub blood_pressure: Option<String>,
    pub temperature: Option<String>,
    pub remarks: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsRequest {
    #[serde(alias = "pulse_rate", alias = "heartRate", alias = "heart_rate")]
    pub pulse: Option<String>,
    #[serde(alias = "blood_pressure", alias = "bp")]
    pub blood_pressure: Option<String>,
    pub temperature: Option<String>,
    pub remarks: Option<String>,
}

// ==============================================================================
// PROCEDURE SESSION
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProcedureStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureSession {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub session_id: Option<Uuid>,
    pub therapy_type: String,
    pub steps: Vec<Step>,
    pub vitals: Vec<Vitals>,
    pub status: ProcedureStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for ProcedureSession {
    const COLLECTION: &'static str = "procedures";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl ProcedureSession {
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// Rounded percentage of completed steps; 0 for an empty step list.
    pub fn progress(&self) -> u8 {
        if self.steps.is_empty() {
            return 0;
        }
        let ratio = self.completed_steps() as f64 / self.steps.len() as f64;
        (ratio * 100.0).round() as u8
    }

    pub fn all_steps_completed(&self) -> bool {
        !self.steps.is_empty() && self.completed_steps() == self.steps.len()
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProcedureStatus::Completed
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProcedureRequest {
    #[serde(alias = "patient_id")]
    pub patient_id: Option<Uuid>,
    #[serde(alias = "therapist_id")]
    pub therapist_id: Option<Uuid>,
    #[serde(alias = "session_id")]
    pub session_id: Option<Uuid>,
    #[serde(alias = "therapy_type")]
    pub therapy_type: Option<String>,
    pub steps: Option<Vec<StepTemplate>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdateRequest {
    #[serde(alias = "step_index")]
    pub step_index: usize,
    pub status: Option<StepStatus>,
    #[serde(default)]
    pub reset: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcedureSearchQuery {
    pub patient_id: Option<Uuid>,
    pub therapist_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub status: Option<ProcedureStatus>,
}

/// Step as returned to clients, with the live timer value.
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    #[serde(flatten)]
    pub step: Step,
    pub live_elapsed_seconds: u64,
}

/// Procedure as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ProcedureView {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub session_id: Option<Uuid>,
    pub therapy_type: String,
    pub status: ProcedureStatus,
    pub steps: Vec<StepView>,
    pub vitals: Vec<Vitals>,
    pub progress: u8,
    pub all_steps_completed: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcedureView {
    pub fn at(procedure: &ProcedureSession, now: DateTime<Utc>) -> Self {
        Self {
            id: procedure.id,
            patient_id: procedure.patient_id,
            therapist_id: procedure.therapist_id,
            session_id: procedure.session_id,
            therapy_type: procedure.therapy_type.clone(),
            status: procedure.status,
            steps: procedure
                .steps
                .iter()
                .map(|step| StepView {
                    live_elapsed_seconds: step.live_elapsed(now),
                    step: step.clone(),
                })
                .collect(),
            vitals: procedure.vitals.clone(),
            progress: procedure.progress(),
            all_steps_completed: procedure.all_steps_completed(),
            start_time: procedure.start_time,
            end_time: procedure.end_time,
            created_at: procedure.created_at,
            updated_at: procedure.updated_at,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcedureError {
    #[error("Procedure not found")]
    NotFound,

    #[error("Step index {index} out of range (procedure has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },

    #[error("Step cannot move from {from} to {to}")]
    InvalidStepTransition { from: StepStatus, to: StepStatus },

    #[error("Procedure is completed; its steps can no longer change")]
    ProcedureCompleted,

    #[error("A procedure already exists for session {0}")]
    AlreadyExists(Uuid),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for ProcedureError {
    fn from(err: StoreError) -> Self {
        ProcedureError::DatabaseError(err.to_string())
    }
}

impl From<ProcedureError> for AppError {
    fn from(err: ProcedureError) -> Self {
        match err {
            ProcedureError::NotFound | ProcedureError::SessionNotFound => AppError::NotFound(err.to_string()),
            ProcedureError::StepOutOfRange { .. } | ProcedureError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            ProcedureError::InvalidStepTransition { .. }
            | ProcedureError::ProcedureCompleted
            | ProcedureError::AlreadyExists(_) => AppError::Conflict(err.to_string()),
            ProcedureError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
