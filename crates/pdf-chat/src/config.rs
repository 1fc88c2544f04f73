//! Configuration for the PDF chat service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Upper bound for `max_retries` on either provider
const MAX_RETRIES: u32 = 10;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Backend used for both embeddings and chat
    pub provider: ProviderKind,
    /// OpenAI configuration
    pub openai: OpenAiConfig,
    /// Ollama configuration
    pub ollama: OllamaConfig,
    /// Embedding request batching
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Vector store configuration
    pub vector_store: VectorStoreConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Chat session configuration
    pub sessions: SessionConfig,
}

impl ChatConfig {
    /// Load configuration: defaults, then the TOML file (if any), then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        if let Some(org) = var("OPENAI_ORGANIZATION") {
            self.openai.organization = Some(org);
        }
        if let Some(host) = var("PDF_CHAT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PDF_CHAT_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PDF_CHAT_PORT: {}", port),
            }
        }
        if let Some(dir) = var("PDF_CHAT_DATA_DIR") {
            self.vector_store.data_dir = PathBuf::from(dir);
        }
        if let Some(provider) = var("PDF_CHAT_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "openai" => self.provider = ProviderKind::OpenAi,
                "ollama" => self.provider = ProviderKind::Ollama,
                other => tracing::warn!("Ignoring unknown PDF_CHAT_PROVIDER: {}", other),
            }
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be positive".into()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be positive".into()));
        }
        for (name, retries) in [
            ("openai.max_retries", self.openai.max_retries),
            ("ollama.max_retries", self.ollama.max_retries),
        ] {
            if retries > MAX_RETRIES {
                return Err(Error::Config(format!(
                    "{} ({}) must be at most {}",
                    name, retries, MAX_RETRIES
                )));
            }
        }
        if self.provider == ProviderKind::OpenAi && self.openai.api_key.is_none() {
            return Err(Error::Config(
                "OPENAI_API_KEY is not set (required for the openai provider)".into(),
            ));
        }
        Ok(())
    }

    /// Name of the embedding model in use
    pub fn embedding_model(&self) -> &str {
        match self.provider {
            ProviderKind::OpenAi => &self.openai.embedding_model,
            ProviderKind::Ollama => &self.ollama.embedding_model,
        }
    }

    /// Name of the chat model in use
    pub fn chat_model(&self) -> &str {
        match self.provider {
            ProviderKind::OpenAi => &self.openai.chat_model,
            ProviderKind::Ollama => &self.ollama.chat_model,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 200MB)
    pub max_upload_size: usize,
    /// Browser page title
    pub page_title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
            enable_cors: true,
            max_upload_size: 200 * 1024 * 1024,
            page_title: "Chat With Your PDFs".to_string(),
        }
    }
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted OpenAI API
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

/// OpenAI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key, usually supplied through `OPENAI_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Optional organization header
    pub organization: Option<String>,
    /// Chat completion model
    pub chat_model: String,
    /// Embedding model
    pub embedding_model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            organization: None,
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Ollama configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Chat model name
    pub chat_model: String,
    /// Embedding model name
    pub embedding_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            temperature: 0.7,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Embedding request batching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Texts per embedding request
    pub batch_size: usize,
    /// Embedding requests in flight at once
    pub concurrent_batches: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 512,
            concurrent_batches: 4,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Separator the text is split on before merging
    pub separator: String,
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Directory the index is saved to and loaded from
    pub data_dir: PathBuf,
    /// HNSW M parameter (connections per layer)
    pub hnsw_m: usize,
    /// HNSW ef_construction parameter
    pub hnsw_ef_construction: usize,
    /// HNSW ef_search parameter
    pub hnsw_ef_search: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the chat model
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// Chat session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are dropped
    pub idle_ttl_secs: u64,
    /// Maximum number of live sessions
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 3600,
            max_sessions: 1000,
        }
    }
}
