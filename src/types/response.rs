//! Response types returned to the transport layer

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{DocumentFormat, Locator};

/// Reference to a chunk that backed an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Chunk identifier within the session
    pub chunk_id: String,
    /// Source location of the chunk
    pub locator: Locator,
    /// Exact text of the chunk
    pub snippet: String,
    /// Similarity score against the query (0.0-1.0, higher is better)
    pub score: f32,
}

impl SourceRef {
    /// Format the reference for display in text
    pub fn format_inline(&self) -> String {
        format!("[Source: chunk {}, {}]", self.chunk_id, self.locator.describe())
    }
}

/// Answer to a question, grounded in the session's document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    /// Generated answer text
    pub answer: String,
    /// Chunks actually included in the model's context, in rank order
    pub sources: Vec<SourceRef>,
}

/// Whole-document summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResult {
    /// Summary text
    pub summary: String,
    /// Number of map batches the document was summarized in
    pub batches: usize,
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Session created for this document
    pub session_id: Uuid,
    /// Original filename
    pub document_name: String,
    /// Detected format
    pub format: DocumentFormat,
    /// Number of chunks indexed
    pub chunk_count: u32,
}

/// Reachability of the external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Embedding service answered its health probe
    pub embedding_service_reachable: bool,
    /// Generation service answered its health probe
    pub generation_service_reachable: bool,
}
