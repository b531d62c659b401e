use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::ApiError;
use crate::chat::ChatReply;
use crate::memory::MemoryMatch;

/// Owner used when a chat request names none
pub const DEFAULT_USER: &str = "default_user";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub owner: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct StoreResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub owner: String,
    pub text: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub results: Vec<MemoryMatch>,
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(request) = payload?;

    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("No message provided"));
    }

    let owner = request
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER.to_string());

    let reply = state.orchestrator.respond(&owner, &request.message).await?;
    Ok(Json(reply))
}

pub async fn store_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StoreRequest>, JsonRejection>,
) -> Result<Json<StoreResponse>, ApiError> {
    let Json(request) = payload?;

    let id = state
        .orchestrator
        .memory()
        .store(&request.owner, &request.text)
        .await?;

    Ok(Json(StoreResponse { id: id.to_string() }))
}

pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload?;
    let memory = state.orchestrator.memory();
    let top_k = request.top_k.unwrap_or_else(|| memory.default_top_k());

    let results = memory
        .query_matches(&request.owner, &request.text, top_k)
        .await?;

    Ok(Json(QueryResponse { results }))
}
