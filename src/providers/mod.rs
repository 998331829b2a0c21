//! Provider abstractions for the embedding and language-model services
//!
//! Trait seams let the engine run against any backend; the bundled
//! implementation targets a local Ollama server.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm, OllamaProvider};
