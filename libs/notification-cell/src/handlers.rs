// libs/notification-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateNotificationRequest, DailyTipRequest};
use crate::services::NotificationService;

#[axum::debug_handler]
pub async fn list_user_notifications(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_self_or_staff(user_id)?;

    let notifications = service.list_for_user(user_id).await?;
    let unread = notifications
        .iter()
        .filter(|n| n.read_at.is_none())
        .count();

    Ok(Json(json!({
        "notifications": notifications,
        "total": notifications.len(),
        "unread": unread
    })))
}

#[axum::debug_handler]
pub async fn create_notification(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let notification = service.create(request).await?;
    Ok(Json(json!({
        "success": true,
        "notification": notification
    })))
}

#[axum::debug_handler]
pub async fn send_notification(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let notification = service.send(notification_id).await?;
    Ok(Json(json!({
        "success": true,
        "notification": notification
    })))
}

#[axum::debug_handler]
pub async fn mark_read(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notification = service.get(notification_id).await?;
    user.require_self_or_staff(notification.user_id)?;

    let notification = service.mark_read(notification_id).await?;
    Ok(Json(json!({
        "success": true,
        "notification": notification
    })))
}

#[axum::debug_handler]
pub async fn delete_notification(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notification = service.get(notification_id).await?;
    user.require_self_or_staff(notification.user_id)?;

    service.delete(notification_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Notification deleted"
    })))
}

#[axum::debug_handler]
pub async fn send_daily_tip(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    Json(request): Json<DailyTipRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let sent = service.send_daily_tip(request).await?;
    Ok(Json(json!({
        "success": true,
        "sent": sent.len(),
        "notifications": sent
    })))
}
