// libs/procedure-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateProcedureRequest, ProcedureSearchQuery, ProcedureView, StepUpdateRequest, VitalsRequest,
};
use crate::services::ProcedureService;

#[axum::debug_handler]
pub async fn list_procedures(
    State(service): State<Arc<ProcedureService>>,
    Extension(user): Extension<User>,
    Query(mut query): Query<ProcedureSearchQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() {
        query.patient_id = Some(user.id);
    }

    let now = Utc::now();
    let procedures: Vec<ProcedureView> = service
        .list(&query)
        .await?
        .iter()
        .map(|p| ProcedureView::at(p, now))
        .collect();

    Ok(Json(json!({
        "procedures": procedures,
        "total": procedures.len()
    })))
}

#[axum::debug_handler]
pub async fn create_procedure(
    State(service): State<Arc<ProcedureService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateProcedureRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let procedure = service.create(request, user.id).await?;
    Ok(Json(json!({
        "success": true,
        "procedure": ProcedureView::at(&procedure, Utc::now())
    })))
}

#[axum::debug_handler]
pub async fn get_procedure(
    State(service): State<Arc<ProcedureService>>,
    Extension(user): Extension<User>,
    Path(procedure_id): Path<Uuid>,
) -> Result<Json<ProcedureView>, AppError> {
    let procedure = service.get(procedure_id).await?;
    user.require_self_or_staff(procedure.patient_id)?;

    Ok(Json(ProcedureView::at(&procedure, Utc::now())))
}

#[axum::debug_handler]
pub async fn update_step(
    State(service): State<Arc<ProcedureService>>,
    Extension(user): Extension<User>,
    Path(procedure_id): Path<Uuid>,
    Json(request): Json<StepUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let procedure = service.update_step(procedure_id, request).await?;
    Ok(Json(json!({
        "success": true,
        "procedure": ProcedureView::at(&procedure, Utc::now())
    })))
}

#[axum::debug_handler]
pub async fn add_vitals(
    State(service): State<Arc<ProcedureService>>,
    Extension(user): Extension<User>,
    Path(procedure_id): Path<Uuid>,
    Json(request): Json<VitalsRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let vitals = service.add_vitals(procedure_id, request, user.id).await?;
    Ok(Json(json!({
        "success": true,
        "vitals": vitals
    })))
}

#[axum::debug_handler]
pub async fn complete_procedure(
    State(service): State<Arc<ProcedureService>>,
    Extension(user): Extension<User>,
    Path(procedure_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let procedure = service.complete(procedure_id).await?;
    Ok(Json(json!({
        "success": true,
        "procedure": ProcedureView::at(&procedure, Utc::now())
    })))
}
