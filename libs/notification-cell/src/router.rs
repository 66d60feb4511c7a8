// libs/notification-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::NotificationService;

pub fn notification_routes(config: Arc<AppConfig>, service: Arc<NotificationService>) -> Router {
    Router::new()
        .route("/", post(handlers::create_notification))
        .route("/daily-tip", post(handlers::send_daily_tip))
        .route("/user/{user_id}", get(handlers::list_user_notifications))
        .route("/{notification_id}", delete(handlers::delete_notification))
        .route("/{notification_id}/read", put(handlers::mark_read))
        .route("/{notification_id}/send", post(handlers::send_notification))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
