// libs/procedure-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::ProcedureService;

pub fn procedure_routes(config: Arc<AppConfig>, service: Arc<ProcedureService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_procedures).post(handlers::create_procedure))
        .route("/{procedure_id}", get(handlers::get_procedure))
        .route("/{procedure_id}/step", put(handlers::update_step))
        .route("/{procedure_id}/vitals", post(handlers::add_vitals))
        .route("/{procedure_id}/complete", put(handlers::complete_procedure))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
