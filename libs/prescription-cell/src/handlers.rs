// libs/prescription-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::form::MultipartForm;
use shared_utils::uploads::sanitize_file_name;

use crate::models::{CreatePrescriptionRequest, PrescriptionSearchQuery};
use crate::services::PrescriptionService;

#[axum::debug_handler]
pub async fn create_prescription(
    State(service): State<Arc<PrescriptionService>>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let mut form = MultipartForm::read(multipart, "file").await?;
    let request = CreatePrescriptionRequest::from_form(&form)?;
    let prescription = service.create(request, form.take_file(), user.id).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription
    })))
}

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(service): State<Arc<PrescriptionService>>,
    Extension(user): Extension<User>,
    Query(mut query): Query<PrescriptionSearchQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() {
        query.patient_id = Some(user.id);
    }

    let prescriptions = service.list(&query).await?;
    Ok(Json(json!({
        "prescriptions": prescriptions,
        "total": prescriptions.len()
    })))
}

#[axum::debug_handler]
pub async fn delete_prescription(
    State(service): State<Arc<PrescriptionService>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;
    service.delete(prescription_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescription deleted"
    })))
}

#[axum::debug_handler]
pub async fn download_prescription(
    State(service): State<Arc<PrescriptionService>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let prescription = service.get(prescription_id).await?;
    user.require_self_or_staff(prescription.patient_id)?;

    let (file, bytes) = service.download(&prescription).await?;
    let content_type = file
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_file_name(&file.original_name)
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
