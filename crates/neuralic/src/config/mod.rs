use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{NeuralicError, Result};

/// Main configuration structure for Neuralic
///
/// Credentials are never part of the file; each provider section names the
/// environment variable its key is read from.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Chat completion configuration
    #[serde(default)]
    pub chat: ChatConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Developer API key registry configuration
    #[serde(default)]
    pub keys: KeysConfig,
    /// Autonomous loop configuration
    #[serde(default)]
    pub autonomy: AutonomyConfig,
}

impl Config {
    /// Load configuration from an explicit path, or from the first default
    /// location that exists, then apply environment overrides.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => {
                tracing::info!("Loading config from: {}", path.display());
                Self::from_file(path)?
            }
            None => match Self::default_paths().into_iter().find(|p| p.exists()) {
                Some(path) => {
                    tracing::info!("Loading config from: {}", path.display());
                    Self::from_file(&path)?
                }
                None => {
                    tracing::info!("No config file found, using defaults");
                    Config::default()
                }
            },
        };

        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NeuralicError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| NeuralicError::Config(format!("Failed to parse config: {e}")))
    }

    fn default_paths() -> Vec<PathBuf> {
        [
            dirs::home_dir().map(|h| h.join(".neuralic").join("config.toml")),
            dirs::config_dir().map(|c| c.join("neuralic").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply the recognised environment overrides using `lookup` to read
    /// variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = lookup("NEURALIC_EMBEDDING_MODEL") {
            if let Some(dimension) = known_embedding_dimension(&model) {
                self.embedding.dimension = dimension;
            }
            self.embedding.model = model;
        }
        if let Some(dimension) = lookup("NEURALIC_EMBEDDING_DIMENSION") {
            self.embedding.dimension = match dimension.trim().parse::<usize>() {
                Ok(d) if d > 0 => d,
                _ => {
                    return Err(NeuralicError::Config(format!(
                        "Invalid NEURALIC_EMBEDDING_DIMENSION '{dimension}': must be positive"
                    )));
                }
            };
        }
        if let Some(name) = lookup("PINECONE_INDEX") {
            self.index.name = name;
        }
        if let Some(host) = lookup("PINECONE_HOST") {
            self.index.host = Some(host);
        }
        if let Some(region) = lookup("PINECONE_ENVIRONMENT") {
            self.index.region = region;
        }
        if let Some(cloud) = lookup("PINECONE_CLOUD") {
            self.index.cloud = cloud;
        }
        if let Some(model) = lookup("NEURALIC_CHAT_MODEL") {
            self.chat.model = model;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|e| NeuralicError::Config(format!("Invalid PORT '{port}': {e}")))?;
            let mut addr: SocketAddr = self.server.listen_addr.parse().map_err(|e| {
                NeuralicError::Config(format!(
                    "Invalid listen address '{}': {e}",
                    self.server.listen_addr
                ))
            })?;
            addr.set_port(port);
            self.server.listen_addr = addr.to_string();
        }

        Ok(())
    }
}

/// Read a provider credential from the named environment variable
pub fn credential(env_name: &str) -> Result<String> {
    match std::env::var(env_name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(NeuralicError::Config(format!(
            "API key env var '{env_name}' not set"
        ))),
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,
    /// Environment variable holding the API key
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,
    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimension produced by the model
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// Per-call timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_api_base(),
            api_key_env: default_openai_api_key_env(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Output length of the OpenAI embedding models at their native size
pub fn known_embedding_dimension(model: &str) -> Option<usize> {
    match model.trim() {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

fn default_embedding_dimension() -> usize {
    1536
}

fn default_provider_timeout_secs() -> u64 {
    5
}

/// Vector index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Index backend: "pinecone" or "memory"
    #[serde(default = "default_index_provider")]
    pub provider: String,
    /// Index name
    #[serde(default = "default_index_name")]
    pub name: String,
    /// Data-plane host; resolved through the control plane when unset
    #[serde(default)]
    pub host: Option<String>,
    /// Control-plane base URL
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_index_api_key_env")]
    pub api_key_env: String,
    /// Namespace records are written to and read from
    #[serde(default)]
    pub namespace: String,
    /// Ask the index to pre-filter candidates by owner metadata
    #[serde(default = "default_prefilter_owner")]
    pub prefilter_owner: bool,
    /// Cloud used when provisioning a serverless index
    #[serde(default = "default_index_cloud")]
    pub cloud: String,
    /// Region used when provisioning a serverless index
    #[serde(default = "default_index_region")]
    pub region: String,
    /// Per-call timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            name: default_index_name(),
            host: None,
            control_plane_url: default_control_plane_url(),
            api_key_env: default_index_api_key_env(),
            namespace: String::new(),
            prefilter_owner: default_prefilter_owner(),
            cloud: default_index_cloud(),
            region: default_index_region(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "pinecone".to_string()
}

fn default_index_name() -> String {
    "neuralic-memory".to_string()
}

fn default_control_plane_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_index_api_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

fn default_prefilter_owner() -> bool {
    true
}

fn default_index_cloud() -> String {
    "aws".to_string()
}

fn default_index_region() -> String {
    "us-east-1".to_string()
}

/// Retrieval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Number of memories returned when the caller does not specify one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Multiplier for the candidate pool requested from the index
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_candidate_multiplier() -> usize {
    3
}

/// Chat completion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,
    /// Environment variable holding the API key
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,
    /// Chat model identifier
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// System prompt placed before the memory context
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Retries on HTTP 429 before giving up
    #[serde(default = "default_chat_max_retries")]
    pub max_retries: u32,
    /// Request timeout in seconds
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_api_base(),
            api_key_env: default_openai_api_key_env(),
            model: default_chat_model(),
            system_prompt: default_system_prompt(),
            max_retries: default_chat_max_retries(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant with memory.".to_string()
}

fn default_chat_max_retries() -> u32 {
    3
}

fn default_chat_timeout_secs() -> u64 {
    60
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Require a registered developer key on every route but /health
    #[serde(default)]
    pub require_api_key: bool,
    /// Whole-request timeout in seconds
    #[serde(default = "default_server_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            require_api_key: false,
            timeout_secs: default_server_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:10000".to_string()
}

fn default_server_timeout_secs() -> u64 {
    120
}

/// Developer API key registry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KeysConfig {
    /// JSON file holding issued keys
    #[serde(default = "default_keys_path")]
    pub path: PathBuf,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            path: default_keys_path(),
        }
    }
}

fn default_keys_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".neuralic"))
        .unwrap_or_else(|| PathBuf::from(".neuralic"))
        .join("dev_keys.json")
}

/// Autonomous loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AutonomyConfig {
    /// Seconds between loop iterations
    #[serde(default = "default_autonomy_interval_secs")]
    pub interval_secs: u64,
    /// Replies buffered for the consumer before iterations wait
    #[serde(default = "default_autonomy_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_autonomy_interval_secs(),
            channel_capacity: default_autonomy_channel_capacity(),
        }
    }
}

fn default_autonomy_interval_secs() -> u64 {
    60
}

fn default_autonomy_channel_capacity() -> usize {
    16
}
