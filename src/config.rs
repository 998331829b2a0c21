//! Configuration for the RAG engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Ollama/LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Session storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Timeout for embedding requests in seconds
    pub embed_timeout_secs: u64,
    /// Timeout for generation requests in seconds (generation is the more
    /// expensive round trip)
    pub generate_timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// How many chunk texts to embed per batched request
    pub embed_batch_size: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "mxbai-embed-large".to_string(),
            generate_model: "gemma3:12b".to_string(),
            temperature: 0.3,
            embed_timeout_secs: 30,
            generate_timeout_secs: 120,
            max_retries: 2,
            embed_batch_size: 32,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks to retrieve per query
    pub top_k: usize,
    /// Maximum characters of retrieved text passed to the model in one call
    pub context_budget_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            context_budget_chars: 12_000,
        }
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one persisted index file per session
    pub storage_dir: PathBuf,
    /// Maximum upload size in bytes
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let storage_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reader-rag")
            .join("sessions");

        Self {
            storage_dir,
            max_upload_bytes: 50 * 1024 * 1024, // 50MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.chunk_size, 1024);
        assert!(config.chunking.chunk_overlap < config.chunking.chunk_size);
        assert_eq!(config.storage.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.llm.generate_timeout_secs > config.llm.embed_timeout_secs);
    }
}
