//! Developer API key registry
//!
//! Keys live in a JSON file as a list of `{key, owner, created_at}`. Every
//! operation re-reads the file, so edits made by the CLI are seen by a
//! running server. Writes go to a sibling temp file that is renamed over
//! the registry, so a reader in another process never sees a partial file.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Prefix of every issued key
pub const KEY_PREFIX: &str = "nk_";

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Key registry I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("Key registry file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, KeyError>;

/// One issued key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

/// File-backed set of developer API keys
#[derive(Debug)]
pub struct ApiKeyRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ApiKeyRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Issue a new key for `owner`
    pub async fn create(&self, owner: &str) -> Result<ApiKey> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(KeyError::InvalidArgument(
                "owner cannot be empty".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;
        let mut keys = self.load().await?;
        let key = ApiKey {
            key: format!("{KEY_PREFIX}{}", Uuid::new_v4().simple()),
            owner: owner.to_string(),
            created_at: Utc::now(),
        };
        keys.push(key.clone());
        self.save(&keys).await?;

        info!("Issued API key for owner {}", key.owner);
        Ok(key)
    }

    /// Every issued key, oldest first
    pub async fn list(&self) -> Result<Vec<ApiKey>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Remove `key`; returns whether it existed
    pub async fn revoke(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut keys = self.load().await?;
        let before = keys.len();
        keys.retain(|k| k.key != key);
        if keys.len() == before {
            return Ok(false);
        }
        self.save(&keys).await?;
        info!("Revoked API key");
        Ok(true)
    }

    /// Whether `key` is currently registered
    pub async fn verify(&self, key: &str) -> Result<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.iter().any(|k| k.key == key))
    }

    async fn load(&self) -> Result<Vec<ApiKey>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No key registry at {}, treating as empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| KeyError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    async fn save(&self, keys: &[ApiKey]) -> Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
                parent.to_path_buf()
            }
            None => PathBuf::from("."),
        };

        let json = serde_json::to_string_pretty(keys).map_err(|e| KeyError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(json.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| KeyError::Io {
            path: self.path.clone(),
            message: format!("write task failed: {e}"),
        })?
        .map_err(|e| self.io_error(e))
    }

    fn io_error(&self, e: std::io::Error) -> KeyError {
        KeyError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}
