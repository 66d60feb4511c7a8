use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{Document, StoreError};
use shared_models::error::AppError;
use shared_utils::uploads::{StoredFile, UploadError};

pub const MAX_AGE: u32 = 150;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    /// Login account of the patient, when they have one.
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub dosha: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    #[serde(default)]
    pub documents: Vec<StoredFile>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Patient {
    const COLLECTION: &'static str = "patients";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    #[serde(alias = "user_id")]
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub dosha: Option<String>,
    #[serde(alias = "medical_history")]
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub dosha: Option<String>,
    #[serde(alias = "medical_history")]
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub dosha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient with email {email} already exists")]
    EmailAlreadyExists { email: String },

    #[error("A patient profile already exists for this account")]
    ProfileExists,

    #[error("Unauthorized access to patient data")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for PatientError {
    fn from(err: StoreError) -> Self {
        PatientError::DatabaseError(err.to_string())
    }
}

impl From<UploadError> for PatientError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidCategory(_) | UploadError::EmptyFile | UploadError::Path(_) => {
                PatientError::ValidationError(err.to_string())
            }
            UploadError::Io(e) => PatientError::Upload(e.to_string()),
        }
    }
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::EmailAlreadyExists { .. } | PatientError::ProfileExists => {
                AppError::Conflict(err.to_string())
            }
            PatientError::Unauthorized => AppError::Forbidden(err.to_string()),
            PatientError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            PatientError::Upload(msg) => AppError::Internal(msg),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
