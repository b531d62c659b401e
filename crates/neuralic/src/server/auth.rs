use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use super::error::ApiError;

/// Header carrying a developer key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests without a registered key when the server requires one
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.require_api_key {
        return next.run(request).await;
    }

    let Some(key) = presented_key(request.headers()) else {
        return ApiError::unauthorized("Missing API key").into_response();
    };

    match state.keys.verify(&key).await {
        Ok(true) => next.run(request).await,
        Ok(false) => ApiError::unauthorized("Invalid API key").into_response(),
        Err(e) => ApiError::from(crate::error::NeuralicError::from(e)).into_response(),
    }
}

/// Key from `x-api-key`, falling back to `Authorization: Bearer`
fn presented_key(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        let key = key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}
