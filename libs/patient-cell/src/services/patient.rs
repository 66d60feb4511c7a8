use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{Collection, DocumentStore, Filter};
use shared_models::auth::User;
use shared_utils::form::UploadedFile;
use shared_utils::uploads::{StoredFile, UploadStore};
use shared_utils::validation::{non_empty, normalize_email, validate_email, validate_phone};

use crate::models::{
    CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest, MAX_AGE,
};

pub const UPLOAD_CATEGORY: &str = "patients";

pub struct PatientService {
    patients: Arc<dyn Collection<Patient>>,
    uploads: UploadStore,
}

impl PatientService {
    pub fn new(store: &DocumentStore, uploads: UploadStore) -> Self {
        Self {
            patients: store.collection::<Patient>(),
            uploads,
        }
    }

    /// Staff register any patient; a patient may only create the profile
    /// linked to their own account.
    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        caller: &User,
    ) -> Result<Patient, PatientError> {
        let user_id = if caller.is_staff() {
            request.user_id
        } else {
            if request.user_id.is_some_and(|id| id != caller.id) {
                return Err(PatientError::Unauthorized);
            }
            Some(caller.id)
        };

        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(PatientError::ValidationError("Name is required".to_string()));
        }
        let email = checked_email(request.email)?;
        let phone = checked_phone(request.phone)?;
        checked_age(request.age)?;

        if let Some(email) = &email {
            let existing = self.patients.find(&Filter::new().eq("email", email)).await?;
            if !existing.is_empty() {
                return Err(PatientError::EmailAlreadyExists { email: email.clone() });
            }
        }
        if let Some(user_id) = user_id {
            if !self.patients.find(&Filter::new().eq("user_id", user_id)).await?.is_empty() {
                return Err(PatientError::ProfileExists);
            }
        }

        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            user_id,
            name,
            email,
            phone,
            age: request.age,
            gender: non_empty(request.gender),
            address: non_empty(request.address),
            dosha: non_empty(request.dosha),
            medical_history: non_empty(request.medical_history),
            allergies: non_empty(request.allergies),
            documents: Vec::new(),
            created_by: caller.id,
            created_at: now,
            updated_at: now,
        };

        let patient = self.patients.insert(patient).await?;
        info!("Patient profile {} created by {}", patient.id, caller.id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid, caller: &User) -> Result<Patient, PatientError> {
        let patient = self.patients.get(patient_id).await?.ok_or(PatientError::NotFound)?;
        ensure_access(&patient, caller)?;
        Ok(patient)
    }

    /// Staff search every profile; patients only see their own.
    pub async fn search_patients(
        &self,
        query: &PatientSearchQuery,
        caller: &User,
    ) -> Result<Vec<Patient>, PatientError> {
        let mut filter = Filter::new();
        if !caller.is_staff() {
            filter = filter.eq("user_id", caller.id);
        }
        if let Some(email) = query.email.as_deref().map(normalize_email).filter(|e| !e.is_empty()) {
            filter = filter.eq("email", email);
        }
        if let Some(phone) = non_empty(query.phone.clone()) {
            filter = filter.eq("phone", phone);
        }

        let name = query.name.as_deref().map(|n| n.trim().to_lowercase()).filter(|n| !n.is_empty());
        let dosha = query.dosha.as_deref().map(|d| d.trim().to_lowercase()).filter(|d| !d.is_empty());

        let mut patients: Vec<Patient> = self
            .patients
            .find(&filter)
            .await?
            .into_iter()
            .filter(|p| name.as_ref().map_or(true, |n| p.name.to_lowercase().contains(n.as_str())))
            .filter(|p| {
                dosha.as_ref().map_or(true, |d| {
                    p.dosha.as_deref().is_some_and(|pd| pd.to_lowercase().contains(d.as_str()))
                })
            })
            .collect();

        patients.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        debug!("Patient search returned {} profiles", patients.len());
        Ok(patients)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        caller: &User,
    ) -> Result<Patient, PatientError> {
        let mut patient = self.get_patient(patient_id, caller).await?;

        if let Some(name) = request.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(PatientError::ValidationError("Name cannot be empty".to_string()));
            }
            patient.name = name;
        }
        if request.email.is_some() {
            let email = checked_email(request.email)?;
            if let Some(email) = &email {
                let taken = self
                    .patients
                    .find(&Filter::new().eq("email", email))
                    .await?
                    .iter()
                    .any(|other| other.id != patient.id);
                if taken {
                    return Err(PatientError::EmailAlreadyExists { email: email.clone() });
                }
            }
            patient.email = email;
        }
        if request.phone.is_some() {
            patient.phone = checked_phone(request.phone)?;
        }
        if request.age.is_some() {
            checked_age(request.age)?;
            patient.age = request.age;
        }
        if request.gender.is_some() {
            patient.gender = non_empty(request.gender);
        }
        if request.address.is_some() {
            patient.address = non_empty(request.address);
        }
        if request.dosha.is_some() {
            patient.dosha = non_empty(request.dosha);
        }
        if request.medical_history.is_some() {
            patient.medical_history = non_empty(request.medical_history);
        }
        if request.allergies.is_some() {
            patient.allergies = non_empty(request.allergies);
        }
        patient.updated_at = Utc::now();

        Ok(self.patients.update(patient).await?)
    }

    /// Deletes the profile and every document uploaded for it.
    pub async fn delete_patient(&self, patient_id: Uuid) -> Result<(), PatientError> {
        let patient = self.patients.get(patient_id).await?.ok_or(PatientError::NotFound)?;
        if !self.patients.delete(patient_id).await? {
            return Err(PatientError::NotFound);
        }

        for document in &patient.documents {
            if let Err(e) = self.uploads.remove(document).await {
                warn!("Could not remove {} for patient {}: {}", document.stored_name, patient_id, e);
            }
        }
        info!("Patient profile {} deleted", patient_id);
        Ok(())
    }

    /// Stores a document and attaches it to the profile.
    pub async fn upload_document(
        &self,
        patient_id: Uuid,
        file: UploadedFile,
        caller: &User,
    ) -> Result<StoredFile, PatientError> {
        let mut patient = self.get_patient(patient_id, caller).await?;

        let stored = self
            .uploads
            .save(UPLOAD_CATEGORY, &file.file_name, file.content_type, file.bytes)
            .await?;

        patient.documents.push(stored.clone());
        patient.updated_at = Utc::now();
        if let Err(e) = self.patients.update(patient).await {
            if let Err(cleanup) = self.uploads.remove(&stored).await {
                warn!("Orphaned upload {}: {}", stored.stored_name, cleanup);
            }
            return Err(e.into());
        }

        info!("Document {} attached to patient {}", stored.stored_name, patient_id);
        Ok(stored)
    }
}

fn ensure_access(patient: &Patient, caller: &User) -> Result<(), PatientError> {
    if caller.is_staff() || patient.user_id == Some(caller.id) {
        Ok(())
    } else {
        Err(PatientError::Unauthorized)
    }
}

fn checked_email(email: Option<String>) -> Result<Option<String>, PatientError> {
    match non_empty(email).map(|e| normalize_email(&e)) {
        Some(email) if !validate_email(&email) => {
            Err(PatientError::ValidationError(format!("Invalid email: {}", email)))
        }
        other => Ok(other),
    }
}

fn checked_phone(phone: Option<String>) -> Result<Option<String>, PatientError> {
    match non_empty(phone) {
        Some(phone) if !validate_phone(&phone) => {
            Err(PatientError::ValidationError(format!("Invalid phone number: {}", phone)))
        }
        other => Ok(other),
    }
}

fn checked_age(age: Option<u32>) -> Result<(), PatientError> {
    match age {
        Some(age) if age > MAX_AGE => Err(PatientError::ValidationError(format!(
            "Age must be between 0 and {}",
            MAX_AGE
        ))),
        _ => Ok(()),
    }
}
