// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::get,
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::SchedulingService;

/// Room administration, availability checks and session booking. Mounted at
/// the API root since the paths span `/admin/rooms`, `/rooms` and `/sessions`.
pub fn scheduling_routes(config: Arc<AppConfig>, service: Arc<SchedulingService>) -> Router {
    Router::new()
        .route("/admin/rooms", get(handlers::list_rooms).post(handlers::create_room))
        .route(
            "/admin/rooms/{room_id}",
            get(handlers::get_room)
                .put(handlers::update_room)
                .delete(handlers::delete_room),
        )
        .route("/rooms/{room_id}/availability", get(handlers::room_availability))
        .route("/sessions", get(handlers::list_sessions).post(handlers::book_session))
        .route(
            "/sessions/{session_id}",
            get(handlers::get_session)
                .put(handlers::update_session)
                .delete(handlers::delete_session),
        )
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
