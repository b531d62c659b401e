//! Pinecone vector index backend
//!
//! Data-plane calls (`/vectors/upsert`, `/query`) go to the index host.
//! The control plane is only used to resolve that host at connect time and
//! to provision the index from the CLI.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use super::{IndexEntry, IndexError, IndexMatch, Metadata, VectorIndex};
use crate::config::{IndexConfig, credential};
use crate::error::{NeuralicError, Result};

const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";
const API_VERSION: &str = "2024-07";

/// Client for a single Pinecone index
#[derive(Debug)]
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    namespace: String,
    prefilter_owner: bool,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a Metadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl PineconeIndex {
    /// Connect using the API key named by `config.api_key_env`
    pub async fn connect(config: &IndexConfig) -> Result<Self> {
        let api_key = credential(&config.api_key_env)?;
        Self::connect_with_key(config, api_key).await
    }

    /// Connect with an explicit API key, resolving the host if needed
    pub async fn connect_with_key(
        config: &IndexConfig,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();

        let host = match &config.host {
            Some(host) => host.clone(),
            None => {
                let control = PineconeControlPlane::new(config, api_key.clone())?;
                let description = control.describe_index(&config.name).await?.ok_or_else(|| {
                    NeuralicError::Config(format!(
                        "Pinecone index '{}' does not exist; run `neuralic-cli index provision`",
                        config.name
                    ))
                })?;
                description.host
            }
        };

        Self::with_host(config, api_key, &host)
    }

    /// Build a client for a known data-plane host
    pub fn with_host(config: &IndexConfig, api_key: impl Into<String>, host: &str) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        let host = normalize_host(host);

        info!("PineconeIndex '{}' connected at {}", config.name, host);

        Ok(Self {
            client,
            host,
            api_key: api_key.into(),
            namespace: config.namespace.clone(),
            prefilter_owner: config.prefilter_owner,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<R, IndexError> {
        let url = format!("{}{}", self.host, path);
        debug!("Calling Pinecone at: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        read_json(response).await
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, entry: IndexEntry) -> std::result::Result<(), IndexError> {
        let request = UpsertRequest {
            vectors: vec![UpsertVector {
                id: &entry.id,
                values: &entry.values,
                metadata: &entry.metadata,
            }],
            namespace: &self.namespace,
        };

        let response: UpsertResponse = self.post("/vectors/upsert", &request).await?;
        debug!("Upserted {} vector(s)", response.upserted_count);
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        owner_hint: Option<&str>,
    ) -> std::result::Result<Vec<IndexMatch>, IndexError> {
        let filter = match owner_hint {
            Some(owner) if self.prefilter_owner => Some(json!({"owner": {"$eq": owner}})),
            _ => None,
        };

        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: &self.namespace,
            filter,
        };

        let response: QueryResponse = self.post("/query", &request).await?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| IndexMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "pinecone"
    }
}

/// Summary of an index as reported by the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub host: String,
    #[serde(default)]
    pub status: Option<Value>,
}

impl IndexDescription {
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.get("ready"))
            .and_then(|r| r.as_bool())
            .unwrap_or(false)
    }
}

/// Pinecone control-plane client (index lifecycle only)
#[derive(Debug)]
pub struct PineconeControlPlane {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PineconeControlPlane {
    pub fn new(config: &IndexConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.control_plane_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Describe an index; `None` when it does not exist
    pub async fn describe_index(
        &self,
        name: &str,
    ) -> std::result::Result<Option<IndexDescription>, IndexError> {
        let url = format!("{}/indexes/{}", self.base_url, name);
        debug!("Describing Pinecone index at: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Api-Key", &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await
            .map_err(network_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        read_json(response).await.map(Some)
    }

    /// Create a serverless cosine index
    pub async fn create_index(
        &self,
        name: &str,
        dimension: usize,
        cloud: &str,
        region: &str,
    ) -> std::result::Result<IndexDescription, IndexError> {
        let url = format!("{}/indexes", self.base_url);
        let body = json!({
            "name": name,
            "dimension": dimension,
            "metric": "cosine",
            "spec": {
                "serverless": {
                    "cloud": cloud,
                    "region": region,
                }
            }
        });

        info!("Creating Pinecone index '{}' ({} dims, {}/{})", name, dimension, cloud, region);

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        read_json(response).await
    }
}

/// Ensure the configured index exists, creating it when missing.
///
/// Returns the description and whether the index was created by this call.
pub async fn provision_index(
    config: &IndexConfig,
    dimension: usize,
    api_key: impl Into<String>,
) -> Result<(IndexDescription, bool)> {
    let control = PineconeControlPlane::new(config, api_key)?;

    if let Some(existing) = control.describe_index(&config.name).await? {
        if existing.dimension != dimension {
            return Err(NeuralicError::Config(format!(
                "Index '{}' has dimension {} but the embedding model produces {}",
                existing.name, existing.dimension, dimension
            )));
        }
        info!("Pinecone index '{}' already exists", existing.name);
        return Ok((existing, false));
    }

    let created = control
        .create_index(&config.name, dimension, &config.cloud, &config.region)
        .await?;
    Ok((created, true))
}

fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| NeuralicError::Config(format!("Failed to create HTTP client: {e}")))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn network_error(e: reqwest::Error) -> IndexError {
    if e.is_timeout() {
        IndexError::Network(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        IndexError::Network(format!("Failed to connect to index: {e}"))
    } else {
        IndexError::Network(format!("Request failed: {e}"))
    }
}

async fn read_json<R: DeserializeOwned>(
    response: reqwest::Response,
) -> std::result::Result<R, IndexError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(IndexError::Api(format!("API returned {status}: {error_text}")));
    }

    response
        .json()
        .await
        .map_err(|e| IndexError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(control_plane_url: String) -> IndexConfig {
        IndexConfig {
            name: "neuralic-test".to_string(),
            control_plane_url,
            ..IndexConfig::default()
        }
    }

    fn metadata(owner: &str, text: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert("owner".to_string(), Value::String(owner.to_string()));
        m.insert("text".to_string(), Value::String(text.to_string()));
        m
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("idx-abc.svc.pinecone.io"),
            "https://idx-abc.svc.pinecone.io"
        );
        assert_eq!(normalize_host("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_upsert_sends_vector_and_metadata() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("Api-Key", "pc-key"))
            .and(body_partial_json(json!({
                "vectors": [{
                    "id": "rec-1",
                    "values": [0.5, 0.5],
                    "metadata": {"owner": "alice", "text": "I live in Lisbon"}
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let index = PineconeIndex::with_host(&IndexConfig::default(), "pc-key", &mock_server.uri())
            .unwrap();

        index
            .upsert(IndexEntry {
                id: "rec-1".to_string(),
                values: vec![0.5, 0.5],
                metadata: metadata("alice", "I live in Lisbon"),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_query_parses_ranked_matches_and_sends_owner_filter() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(json!({
                "topK": 6,
                "includeMetadata": true,
                "filter": {"owner": {"$eq": "alice"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    {"id": "a", "score": 0.92, "metadata": {"owner": "alice", "text": "blue"}},
                    {"id": "b", "score": 0.41, "metadata": {"owner": "alice", "text": "Lisbon"}},
                    {"id": "c", "score": 0.10}
                ],
                "namespace": ""
            })))
            .mount(&mock_server)
            .await;

        let index = PineconeIndex::with_host(&IndexConfig::default(), "pc-key", &mock_server.uri())
            .unwrap();

        let matches = index.query(&[1.0, 0.0], 6, Some("alice")).await.unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].id, "a");
        assert!((matches[0].score - 0.92).abs() < f32::EPSILON);
        assert_eq!(matches[1].metadata["text"], "Lisbon");
        assert!(matches[2].metadata.is_empty());
    }

    #[tokio::test]
    async fn test_query_surfaces_server_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&mock_server)
            .await;

        let index = PineconeIndex::with_host(&IndexConfig::default(), "pc-key", &mock_server.uri())
            .unwrap();

        let err = index.query(&[1.0], 5, None).await.unwrap_err();
        assert!(matches!(err, IndexError::Api(_)));
    }

    #[tokio::test]
    async fn test_connect_resolves_host_through_control_plane() {
        let control = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes/neuralic-test"))
            .and(header("Api-Key", "pc-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "neuralic-test",
                "dimension": 1536,
                "metric": "cosine",
                "host": "neuralic-test-abc.svc.pinecone.io",
                "status": {"ready": true, "state": "Ready"}
            })))
            .mount(&control)
            .await;

        let index = PineconeIndex::connect_with_key(&test_config(control.uri()), "pc-key")
            .await
            .unwrap();
        assert_eq!(index.host(), "https://neuralic-test-abc.svc.pinecone.io");
    }

    #[tokio::test]
    async fn test_connect_missing_index_is_config_error() {
        let control = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes/neuralic-test"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&control)
            .await;

        let err = PineconeIndex::connect_with_key(&test_config(control.uri()), "pc-key")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_provision_creates_missing_index() {
        let control = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes/neuralic-test"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&control)
            .await;

        Mock::given(method("POST"))
            .and(path("/indexes"))
            .and(body_partial_json(json!({
                "name": "neuralic-test",
                "dimension": 1536,
                "metric": "cosine",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "name": "neuralic-test",
                "dimension": 1536,
                "metric": "cosine",
                "host": "neuralic-test-abc.svc.pinecone.io",
                "status": {"ready": false, "state": "Initializing"}
            })))
            .expect(1)
            .mount(&control)
            .await;

        let (description, created) =
            provision_index(&test_config(control.uri()), 1536, "pc-key")
                .await
                .unwrap();
        assert!(created);
        assert!(!description.is_ready());
    }

    #[tokio::test]
    async fn test_provision_rejects_dimension_mismatch() {
        let control = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes/neuralic-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "neuralic-test",
                "dimension": 384,
                "metric": "cosine",
                "host": "neuralic-test-abc.svc.pinecone.io"
            })))
            .mount(&control)
            .await;

        let err = provision_index(&test_config(control.uri()), 1536, "pc-key")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension 384"));
    }
}
