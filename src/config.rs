//! Gateway configuration
//!
//! Every setting has a serde default and can be overridden through
//! environment variables via [`GatewayConfig::from_env`].

use secrecy::Secret;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, ServiceError};

/// Top-level gateway configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// HTML layout template used as structure-only context by the
    /// field-extraction endpoint. Loaded once at startup.
    #[serde(default)]
    pub extract_template_path: Option<PathBuf>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Maximum request body size in bytes (uploads)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Maximum concurrent generation calls against the model API
    #[serde(default = "default_max_concurrent_generations")]
    pub max_concurrent_generations: usize,
}

/// Generative Language API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// Base URL of the API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key (read from env GEMINI_API_KEY if not set)
    #[serde(default)]
    pub api_key: Option<Secret<String>>,

    /// Model used for OCR, extraction and answering
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    /// Model used for embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Chunking and nearest-neighbor search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters of overlap between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Default number of chunks returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

// Default value functions
fn default_bind_addr() -> String { "0.0.0.0:5000".to_string() }
fn default_max_body_bytes() -> usize { 5 * 1024 * 1024 }
fn default_max_concurrent_generations() -> usize { 8 }
fn default_api_url() -> String { "https://generativelanguage.googleapis.com/v1beta".to_string() }
fn default_generation_model() -> String { "gemini-2.0-flash".to_string() }
fn default_embedding_model() -> String { "text-embedding-004".to_string() }
fn default_timeout_ms() -> u64 { 30_000 }
fn default_chunk_size() -> usize { 500 }
fn default_chunk_overlap() -> usize { 50 }
fn default_top_k() -> usize { 3 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
            max_concurrent_generations: default_max_concurrent_generations(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            generation_model: default_generation_model(),
            embedding_model: default_embedding_model(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("GATEWAY_BIND_ADDR") {
            self.server.bind_addr = val;
        }

        if let Ok(val) = std::env::var("GATEWAY_MAX_BODY_BYTES") {
            if let Ok(bytes) = val.parse() {
                self.server.max_body_bytes = bytes;
            }
        }

        if let Ok(val) = std::env::var("GATEWAY_MAX_CONCURRENT_GENERATIONS") {
            if let Ok(max) = val.parse() {
                self.server.max_concurrent_generations = max;
            }
        }

        if let Ok(val) = std::env::var("GEMINI_API_URL") {
            self.gemini.api_url = val;
        }

        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            self.gemini.api_key = Some(Secret::new(val));
        }

        if let Ok(val) = std::env::var("GEMINI_GENERATION_MODEL") {
            self.gemini.generation_model = val;
        }

        if let Ok(val) = std::env::var("GEMINI_EMBEDDING_MODEL") {
            self.gemini.embedding_model = val;
        }

        if let Ok(val) = std::env::var("GEMINI_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.gemini.timeout_ms = timeout;
            }
        }

        if let Ok(val) = std::env::var("RETRIEVAL_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                self.retrieval.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("RETRIEVAL_CHUNK_OVERLAP") {
            if let Ok(overlap) = val.parse() {
                self.retrieval.chunk_overlap = overlap;
            }
        }

        if let Ok(val) = std::env::var("RETRIEVAL_TOP_K") {
            if let Ok(k) = val.parse() {
                self.retrieval.top_k = k;
            }
        }

        if let Ok(val) = std::env::var("EXTRACT_TEMPLATE_PATH") {
            self.extract_template_path = Some(PathBuf::from(val));
        }

        self
    }

    /// Reject chunk parameters that would make the chunker loop forever.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.chunk_size == 0 {
            return Err(ServiceError::InvalidConfiguration(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ServiceError::InvalidConfiguration(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.retrieval.chunk_overlap, self.retrieval.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(ServiceError::InvalidConfiguration(
                "top_k must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl GeminiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
