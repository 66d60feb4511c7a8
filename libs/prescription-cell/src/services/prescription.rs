// libs/prescription-cell/src/services/prescription.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use shared_database::{Collection, DocumentStore, Filter};
use shared_utils::form::UploadedFile;
use shared_utils::uploads::{StoredFile, UploadStore};

use crate::models::{CreatePrescriptionRequest, Prescription, PrescriptionError, PrescriptionSearchQuery};

pub const UPLOAD_CATEGORY: &str = "prescriptions";

pub struct PrescriptionService {
    prescriptions: Arc<dyn Collection<Prescription>>,
    uploads: UploadStore,
}

impl PrescriptionService {
    pub fn new(store: &DocumentStore, uploads: UploadStore) -> Self {
        Self {
            prescriptions: store.collection::<Prescription>(),
            uploads,
        }
    }

    /// Records a prescription with an optional scanned file. The file is
    /// stored first and removed again if the record cannot be saved.
    pub async fn create(
        &self,
        request: CreatePrescriptionRequest,
        file: Option<UploadedFile>,
        prescribed_by: Uuid,
    ) -> Result<Prescription, PrescriptionError> {
        let patient_id = request
            .patient_id
            .ok_or_else(|| PrescriptionError::ValidationError("patientId is required".to_string()))?;
        let title = request
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PrescriptionError::ValidationError("Title is required".to_string()))?;
        if request.medicines.iter().any(|m| m.name.trim().is_empty()) {
            return Err(PrescriptionError::ValidationError("Every medicine needs a name".to_string()));
        }

        let stored = match file {
            Some(file) => Some(
                self.uploads
                    .save(UPLOAD_CATEGORY, &file.file_name, file.content_type, file.bytes)
                    .await?,
            ),
            None => None,
        };

        let prescription = Prescription {
            id: Uuid::new_v4(),
            patient_id,
            prescribed_by,
            title,
            notes: request.notes,
            medicines: request.medicines,
            file: stored.clone(),
            created_at: Utc::now(),
        };

        match self.prescriptions.insert(prescription).await {
            Ok(prescription) => {
                info!(
                    "Prescription {} for patient {} recorded by {}",
                    prescription.id, patient_id, prescribed_by
                );
                Ok(prescription)
            }
            Err(e) => {
                if let Some(stored) = &stored {
                    self.discard(stored).await;
                }
                Err(e.into())
            }
        }
    }

    /// Newest first.
    pub async fn list(&self, query: &PrescriptionSearchQuery) -> Result<Vec<Prescription>, PrescriptionError> {
        let mut filter = Filter::new();
        if let Some(patient_id) = query.patient_id {
            filter = filter.eq("patient_id", patient_id);
        }
        if let Some(prescribed_by) = query.prescribed_by {
            filter = filter.eq("prescribed_by", prescribed_by);
        }

        let mut prescriptions = self.prescriptions.find(&filter).await?;
        prescriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(prescriptions)
    }

    pub async fn get(&self, prescription_id: Uuid) -> Result<Prescription, PrescriptionError> {
        self.prescriptions
            .get(prescription_id)
            .await?
            .ok_or(PrescriptionError::NotFound)
    }

    /// Deletes the record and its file.
    pub async fn delete(&self, prescription_id: Uuid) -> Result<(), PrescriptionError> {
        let prescription = self.get(prescription_id).await?;
        if !self.prescriptions.delete(prescription_id).await? {
            return Err(PrescriptionError::NotFound);
        }

        if let Some(file) = &prescription.file {
            self.discard(file).await;
        }
        info!("Prescription {} deleted", prescription_id);
        Ok(())
    }

    /// The attached file and its contents.
    pub async fn download(&self, prescription: &Prescription) -> Result<(StoredFile, Vec<u8>), PrescriptionError> {
        let file = prescription.file.clone().ok_or(PrescriptionError::NoFile)?;
        let bytes = self.uploads.read(&file).await?;
        Ok((file, bytes))
    }

    async fn discard(&self, file: &StoredFile) {
        if let Err(e) = self.uploads.remove(file).await {
            warn!("Could not remove upload {}: {}", file.stored_name, e);
        }
    }
}
