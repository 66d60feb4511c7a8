use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::{header::AUTHORIZATION, HeaderMap},
};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;

use crate::models::{LoginRequest, RegisterRequest};
use crate::services::AuthService;

/// Optional caller identity on a public route.
fn caller_from_headers(service: &AuthService, headers: &HeaderMap) -> Option<User> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = bearer_token(value).ok()?;
    service.authenticate(token)
}

pub async fn register(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Registering {}", request.email);

    let caller = caller_from_headers(&service, &headers);
    let response = service.register(request, caller.as_ref()).await?;
    Ok(Json(response))
}

pub async fn login(
    State(service): State<Arc<AuthService>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let response = service.login(request).await?;
    Ok(Json(response))
}

pub async fn me(
    State(service): State<Arc<AuthService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let profile = service.me(&user).await?;
    Ok(Json(json!({ "user": profile })))
}
