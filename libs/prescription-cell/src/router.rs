// libs/prescription-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::PrescriptionService;

pub fn prescription_routes(config: Arc<AppConfig>, service: Arc<PrescriptionService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_prescriptions).post(handlers::create_prescription))
        .route("/{prescription_id}", delete(handlers::delete_prescription))
        .route("/{prescription_id}/download", get(handlers::download_prescription))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
