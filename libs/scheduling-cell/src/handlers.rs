// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    AvailabilityQuery, BookSessionRequest, BookingDecision, CreateRoomRequest,
    SessionSearchQuery, UpdateRoomRequest, UpdateSessionRequest,
};
use crate::services::SchedulingService;

// ==============================================================================
// ROOM HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_rooms(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let rooms = service.list_rooms().await?;
    Ok(Json(json!({
        "rooms": rooms,
        "total": rooms.len()
    })))
}

#[axum::debug_handler]
pub async fn create_room(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let room = service.create_room(request).await?;
    Ok(Json(json!({
        "success": true,
        "room": room
    })))
}

#[axum::debug_handler]
pub async fn get_room(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let room = service.get_room(room_id).await?;
    Ok(Json(json!(room)))
}

#[axum::debug_handler]
pub async fn update_room(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(room_id): Path<Uuid>,
    Json(request): Json<UpdateRoomRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    let room = service.update_room(room_id, request).await?;
    Ok(Json(json!({
        "success": true,
        "room": room
    })))
}

#[axum::debug_handler]
pub async fn delete_room(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;

    service.delete_room(room_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Room deleted"
    })))
}

/// Runs the booking validator without booking anything. Refusals are a
/// normal answer here, not an error.
#[axum::debug_handler]
pub async fn room_availability(
    State(service): State<Arc<SchedulingService>>,
    Extension(_user): Extension<User>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<BookingDecision>, AppError> {
    match service.check_availability(room_id, query.start, query.end).await {
        Ok(slot) => Ok(Json(BookingDecision { ok: true, slot: Some(slot), reason: None })),
        Err(e) if e.is_booking_refusal() => Ok(Json(BookingDecision {
            ok: false,
            slot: None,
            reason: Some(e.to_string()),
        })),
        Err(e) => Err(e.into()),
    }
}

// ==============================================================================
// SESSION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_sessions(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Query(mut query): Query<SessionSearchQuery>,
) -> Result<Json<Value>, AppError> {
    // patients only ever see their own sessions
    if !user.is_staff() {
        query.patient_id = Some(user.id);
    }

    let sessions = service.list_sessions(&query).await?;
    Ok(Json(json!({
        "sessions": sessions,
        "total": sessions.len()
    })))
}

#[axum::debug_handler]
pub async fn book_session(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookSessionRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let session = service.book_session(request, user.id).await?;
    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

#[axum::debug_handler]
pub async fn get_session(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let session = service.get_session(session_id).await?;
    user.require_self_or_staff(session.patient_id)?;

    Ok(Json(json!(session)))
}

#[axum::debug_handler]
pub async fn update_session(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<UpdateSessionRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let session = service.update_session(session_id, request).await?;
    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

#[axum::debug_handler]
pub async fn delete_session(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    service.delete_session(session_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Session deleted"
    })))
}
