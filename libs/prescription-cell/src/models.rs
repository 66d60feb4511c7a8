// libs/prescription-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::{Document, StoreError};
use shared_models::error::AppError;
use shared_utils::form::MultipartForm;
use shared_utils::uploads::{StoredFile, UploadError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub prescribed_by: Uuid,
    pub title: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    pub file: Option<StoredFile>,
    pub created_at: DateTime<Utc>,
}

impl Document for Prescription {
    const COLLECTION: &'static str = "prescriptions";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Text part of the multipart create form.
#[derive(Debug, Clone, Default)]
pub struct CreatePrescriptionRequest {
    pub patient_id: Option<Uuid>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub medicines: Vec<Medicine>,
}

impl CreatePrescriptionRequest {
    /// Reads `patientId`, `title`, `notes` and `medicines` (a JSON array)
    /// from the form. Snake-case field names are accepted too.
    pub fn from_form(form: &MultipartForm) -> Result<Self, PrescriptionError> {
        let patient_id = form
            .text_any(&["patientId", "patient_id"])
            .map(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|_| PrescriptionError::ValidationError(format!("Invalid patientId: {}", raw)))
            })
            .transpose()?;

        let medicines = match form.text("medicines") {
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                PrescriptionError::ValidationError(format!("medicines must be a JSON list: {}", e))
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            patient_id,
            title: form.text("title").map(str::to_string),
            notes: form.text("notes").map(str::to_string),
            medicines,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionSearchQuery {
    pub patient_id: Option<Uuid>,
    pub prescribed_by: Option<Uuid>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrescriptionError {
    #[error("Prescription not found")]
    NotFound,

    #[error("Prescription has no attached file")]
    NoFile,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for PrescriptionError {
    fn from(err: StoreError) -> Self {
        PrescriptionError::DatabaseError(err.to_string())
    }
}

impl From<UploadError> for PrescriptionError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidCategory(_) | UploadError::EmptyFile | UploadError::Path(_) => {
                PrescriptionError::ValidationError(err.to_string())
            }
            UploadError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => PrescriptionError::NoFile,
            UploadError::Io(e) => PrescriptionError::Upload(e.to_string()),
        }
    }
}

impl From<PrescriptionError> for AppError {
    fn from(err: PrescriptionError) -> Self {
        match err {
            PrescriptionError::NotFound | PrescriptionError::NoFile => AppError::NotFound(err.to_string()),
            PrescriptionError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            PrescriptionError::Upload(msg) => AppError::Internal(msg),
            PrescriptionError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
