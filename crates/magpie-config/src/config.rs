//! Configuration structures and loading.

use crate::error::ConfigResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub qdrant: QdrantConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub crawl: CrawlConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a specific path, falling back to defaults
    /// when the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Magpie Configuration
# Hybrid-index ingestion service

[embedding]
# Dense embedding service (POST /embed, POST /tokenize)
dense_url = "http://localhost:8910"

# Sparse embedding service (POST /embed)
sparse_url = "http://localhost:8911"

# Dimension of the dense vectors
dimension = 1024

# Maximum tokens per embedded chunk
window = 512

# Request timeout in seconds
timeout_seconds = 60

[qdrant]
# Qdrant REST endpoint
url = "http://localhost:6333"

# Optional API key
# api_key = ""

[render]
# Headless render service (POST /sessions, POST /sessions/{id}/render)
url = "http://localhost:8920"

# Per-page render timeout in seconds
timeout_seconds = 60

# Concurrent renders per session
concurrency = 4

[crawl]
# Connection timeout in seconds
connect_timeout_seconds = 10

# Total per-request timeout in seconds
request_timeout_seconds = 30

# Maximum simultaneous connections
max_connections = 10

[server]
# Address to bind the HTTP control surface to
bind = "127.0.0.1:8900"

# Points per upsert batch
upsert_batch_size = 64
"#
        .to_string()
    }
}

/// Embedding service endpoints and model geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dense_url: String,
    pub sparse_url: String,
    /// Dense vector dimension, fixed per collection.
    pub dimension: usize,
    /// Maximum tokens a single embedded chunk may contain.
    pub window: usize,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dense_url: "http://localhost:8910".to_string(),
            sparse_url: "http://localhost:8911".to_string(),
            dimension: 1024,
            window: 512,
            timeout_seconds: 60,
        }
    }
}

/// Qdrant endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
        }
    }
}

/// Headless render service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub concurrency: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8920".to_string(),
            timeout_seconds: 60,
            concurrency: 4,
        }
    }
}

/// Link-discovery crawl bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub max_connections: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 10,
            request_timeout_seconds: 30,
            max_connections: 10,
        }
    }
}

/// HTTP control surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub upsert_batch_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8900".to_string(),
            upsert_batch_size: 64,
        }
    }
}
