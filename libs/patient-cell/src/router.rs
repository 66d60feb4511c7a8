use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;
use crate::services::PatientService;

pub fn patient_routes(config: Arc<AppConfig>, service: Arc<PatientService>) -> Router {
    Router::new()
        .route("/", get(search_patients).post(create_patient))
        .route("/{id}", get(get_patient).put(update_patient).delete(delete_patient))
        .route("/{id}/upload", post(upload_document))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
