//! End-to-end tests over HTTP providers
//!
//! Wires the OpenAI-compatible embedding and chat clients and the Pinecone
//! index client to wiremock servers, then drives the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use neuralic::chat::{ChatOrchestrator, OpenAiChat};
use neuralic::config::{ChatConfig, EmbeddingConfig, IndexConfig, ServerConfig};
use neuralic::embedding::OpenAiEmbeddings;
use neuralic::keys::ApiKeyRegistry;
use neuralic::memory::{MemoryError, MemoryStore, StoreOptions};
use neuralic::server::{AppState, create_router};
use neuralic::storage::PineconeIndex;

fn embedding_config(api_base: String) -> EmbeddingConfig {
    EmbeddingConfig {
        api_base,
        dimension: 3,
        ..EmbeddingConfig::default()
    }
}

fn index_config() -> IndexConfig {
    IndexConfig {
        name: "neuralic-test".to_string(),
        ..IndexConfig::default()
    }
}

async fn mount_embedding(server: &MockServer, vector: [f32; 3]) {
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": vector, "index": 0 }]
        })))
        .mount(server)
        .await;
}

fn memory_store(openai: &MockServer, pinecone: &MockServer) -> MemoryStore {
    let embedder = OpenAiEmbeddings::new(&embedding_config(openai.uri()), "sk-test").unwrap();
    let index = PineconeIndex::with_host(&index_config(), "pc-test", &pinecone.uri()).unwrap();
    MemoryStore::new(Arc::new(embedder), Arc::new(index), StoreOptions::default())
}

// =============================================================================
// MemoryStore over HTTP providers
// =============================================================================

#[tokio::test]
async fn test_store_upserts_owner_metadata() {
    let openai = MockServer::start().await;
    let pinecone = MockServer::start().await;
    mount_embedding(&openai, [0.1, 0.2, 0.3]).await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(header("Api-Key", "pc-test"))
        .and(body_partial_json(json!({
            "vectors": [{ "metadata": { "owner": "alice", "text": "likes tea" } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 1 })))
        .expect(1)
        .mount(&pinecone)
        .await;

    let store = memory_store(&openai, &pinecone);
    store.store("alice", "likes tea").await.unwrap();
}

#[tokio::test]
async fn test_query_filters_foreign_matches_from_index() {
    let openai = MockServer::start().await;
    let pinecone = MockServer::start().await;
    mount_embedding(&openai, [0.1, 0.2, 0.3]).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({
            "topK": 6,
            "includeMetadata": true,
            "filter": { "owner": { "$eq": "alice" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                { "id": "1", "score": 0.99, "metadata": { "owner": "bob", "text": "bob secret" } },
                { "id": "2", "score": 0.80, "metadata": { "owner": "alice", "text": "likes tea" } },
                { "id": "3", "score": 0.70, "metadata": { "text": "orphan" } },
                {
                    "id": "4",
                    "score": 0.60,
                    "metadata": { "owner": "alice", "text": "lives in Porto" }
                }
            ]
        })))
        .expect(1)
        .mount(&pinecone)
        .await;

    let store = memory_store(&openai, &pinecone);
    let results = store.query("alice", "what do I drink?", 2).await.unwrap();

    assert_eq!(results, vec!["likes tea", "lives in Porto"]);
}

#[tokio::test]
async fn test_embedding_auth_failure_is_embedding_unavailable() {
    let openai = MockServer::start().await;
    let pinecone = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&openai)
        .await;

    let store = memory_store(&openai, &pinecone);
    let err = store.store("alice", "hello").await.unwrap_err();

    assert!(matches!(err, MemoryError::EmbeddingUnavailable(_)));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_index_outage_is_persistence_unavailable() {
    let openai = MockServer::start().await;
    let pinecone = MockServer::start().await;
    mount_embedding(&openai, [0.1, 0.2, 0.3]).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&pinecone)
        .await;

    let store = memory_store(&openai, &pinecone);
    let err = store.query("alice", "hello", 5).await.unwrap_err();

    assert!(matches!(err, MemoryError::PersistenceUnavailable(_)));
}

#[tokio::test]
async fn test_wrong_embedding_length_is_rejected() {
    let openai = MockServer::start().await;
    let pinecone = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [0.1, 0.2], "index": 0 }]
        })))
        .mount(&openai)
        .await;

    let store = memory_store(&openai, &pinecone);
    let err = store.store("alice", "hello").await.unwrap_err();

    assert!(matches!(err, MemoryError::EmbeddingUnavailable(_)));
}

// =============================================================================
// HTTP API
// =============================================================================

#[tokio::test]
async fn test_chat_endpoint_end_to_end() {
    let openai = MockServer::start().await;
    let pinecone = MockServer::start().await;
    mount_embedding(&openai, [0.1, 0.2, 0.3]).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {
                    "id": "1",
                    "score": 0.9,
                    "metadata": { "owner": "alice", "text": "user: I love jazz" }
                }
            ]
        })))
        .mount(&pinecone)
        .await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 1 })))
        .expect(2)
        .mount(&pinecone)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "system", "content": "You are a helpful AI assistant with memory." },
                { "role": "system", "content": "Relevant memories:\nuser: I love jazz" },
                { "role": "user", "content": "recommend some music" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Try Kind of Blue." } }]
        })))
        .expect(1)
        .mount(&openai)
        .await;

    let store = memory_store(&openai, &pinecone);
    let chat_config = ChatConfig {
        api_base: openai.uri(),
        ..ChatConfig::default()
    };
    let chat = OpenAiChat::new(&chat_config, "sk-test")
        .unwrap()
        .with_backoff(Duration::from_millis(10));
    let orchestrator =
        ChatOrchestrator::new(store, Arc::new(chat), chat_config.system_prompt.clone());

    let dir = tempfile::tempdir().unwrap();
    let keys = Arc::new(ApiKeyRegistry::new(dir.path().join("dev_keys.json")));
    let state = Arc::new(AppState::new(&ServerConfig::default(), orchestrator, keys));
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"user_id": "alice", "message": "recommend some music"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["reply"], "Try Kind of Blue.");
    assert_eq!(body["memories_used"], json!(["user: I love jazz"]));
}
