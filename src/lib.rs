//! reader-rag: session-isolated RAG engine for single-document Q&A
//!
//! Each uploaded document gets its own session with a private,
//! independently persisted vector index. The pipeline normalizes the
//! document into text blocks, splits them into overlapping chunks, embeds
//! the chunks, and answers questions by retrieving the most similar chunks
//! and prompting a language model with a bounded context. Summaries cover
//! the whole document via map-reduce rather than a single retrieval.
//!
//! The transport layer is not part of this crate; [`RagEngine`] exposes
//! upload/query/summarize/clear/health as library calls.

pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod logging;
pub mod providers;
pub mod session;
pub mod types;

pub use config::RagConfig;
pub use engine::RagEngine;
pub use error::{Error, Result};
pub use types::{
    Chunk, DocumentFormat, HealthStatus, Locator, QueryAnswer, SessionMeta, SourceRef,
    SummaryResult, TextBlock, UploadReceipt,
};
