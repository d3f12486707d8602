use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole service.
///
/// Every section has defaults, so a YAML file only needs the keys it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub rag: RagConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

/// Which remote API the model clients speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions` + `/embeddings`
    OpenAi,
    /// Ollama `/api/chat` + `/api/embed`
    Ollama,
}

/// Connection settings shared by the chat and embedding clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    /// Bearer token. Usually supplied through `RAGBOT_API_KEY` instead of the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Extra attempts on transient failures (connection errors, 5xx).
    pub max_retries: u32,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration for the answering model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// What ingestion does with a chunk whose embedding could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingFailurePolicy {
    /// Leave the chunk out of the index.
    Skip,
    /// Index a zero vector and tag the entry with `degraded: true`.
    ZeroVector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
    /// Texts per embedding request during ingestion
    pub batch_size: usize,
    /// Embedding requests in flight at once during ingestion
    pub concurrency: usize,
    pub on_failure: EmbeddingFailurePolicy,
}

/// Similarity function used by the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cosine,
    Dot,
}

/// Configuration for chunking and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by adjacent chunks
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub metric: Metric,
    /// Rewrite follow-up questions into standalone ones before retrieval.
    pub condense_questions: bool,
}

/// Where documents are read from and where the index lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub documents_dir: PathBuf,
    pub index_path: PathBuf,
    /// File extensions picked up by the loader
    pub extensions: Vec<String>,
    /// Skips directories/files whose name contains one of these strings
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Routes are served at the root and again under this prefix.
    pub api_prefix: String,
    pub cors: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            base_url: "https://api.sarvam.ai/v1".to_string(),
            api_key: None,
            timeout_secs: 30,
            max_retries: 1,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "sarvam-2b".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "sarvam-embed".to_string(),
            dimension: 768,
            batch_size: 32,
            concurrency: 4,
            on_failure: EmbeddingFailurePolicy::Skip,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            metric: Metric::Cosine,
            condense_questions: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./data/documents"),
            index_path: PathBuf::from("./data/vectorstore/index.rbix"),
            extensions: vec!["txt".to_string(), "pdf".to_string()],
            exclude_patterns: crate::patterns::default_exclude_patterns(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            api_prefix: "/api".to_string(),
            cors: true,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }

    /// Write the configuration back as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `RAGBOT_*` environment overrides, reading `.env` first if present.
    pub fn with_env_overrides(mut self) -> Self {
        let _ = dotenvy::dotenv();
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("RAGBOT_API_KEY").filter(|k| !k.is_empty()) {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = lookup("RAGBOT_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(model) = lookup("RAGBOT_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = lookup("RAGBOT_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dir) = lookup("RAGBOT_DOCUMENTS_DIR") {
            self.storage.documents_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("RAGBOT_INDEX_PATH") {
            self.storage.index_path = PathBuf::from(path);
        }
        if let Some(bind) = lookup("RAGBOT_BIND") {
            self.server.bind = bind;
        }
    }

    /// Checks the numeric settings the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::Invalid("rag.chunk_size must be positive".into()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be positive".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid("embedding.dimension must be positive".into()));
        }
        if self.embedding.batch_size == 0 || self.embedding.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "embedding.batch_size and embedding.concurrency must be positive".into(),
            ));
        }
        if !self.server.api_prefix.is_empty() && !self.server.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.api_prefix must start with '/' (got {:?})",
                self.server.api_prefix
            )));
        }
        Ok(())
    }
}
