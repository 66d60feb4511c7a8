use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::RealtimeHub;

pub fn realtime_routes(config: Arc<AppConfig>, hub: Arc<RealtimeHub>) -> Router {
    Router::new()
        .route("/ws", get(handlers::subscribe_ws))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(hub)
}
