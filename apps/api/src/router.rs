use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::services::ServeDir;

use appointment_cell::appointment_routes;
use auth_cell::auth_routes;
use notification_cell::notification_routes;
use patient_cell::patient_routes;
use prescription_cell::prescription_routes;
use procedure_cell::procedure_routes;
use realtime_cell::realtime_routes;
use scheduling_cell::scheduling_routes;

use crate::state::AppState;

pub fn create_router(state: &AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .route("/health", get(health).with_state(state.in_memory))
        .nest("/auth", auth_routes(config.clone(), state.auth.clone()))
        .nest("/patients", patient_routes(config.clone(), state.patients.clone()))
        .nest("/procedures", procedure_routes(config.clone(), state.procedures.clone()))
        .nest("/appointments", appointment_routes(config.clone(), state.appointments.clone()))
        .nest("/prescriptions", prescription_routes(config.clone(), state.prescriptions.clone()))
        .nest("/notifications", notification_routes(config.clone(), state.notifications.clone()))
        .nest("/realtime", realtime_routes(config.clone(), state.hub.clone()))
        // rooms and sessions live at /api/admin/rooms, /api/rooms, /api/sessions
        .merge(scheduling_routes(config.clone(), state.scheduling.clone()));

    Router::new()
        .route("/", get(|| async { "AyurSutra API is running!" }))
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
}

async fn health(State(in_memory): State<bool>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ayursutra-api",
        "store": if in_memory { "memory" } else { "supabase" }
    }))
}
