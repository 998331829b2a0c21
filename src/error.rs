//! Error types for the RAG pipeline

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// File format outside the supported set
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Byte stream could not be decoded as the declared format
    #[error("Failed to parse '{filename}': {message}")]
    Parse { filename: String, message: String },

    /// Extraction produced no text
    #[error("Document '{0}' contains no extractable text")]
    EmptyDocument(String),

    /// A session with this identifier is already live
    #[error("Session already exists: {0}")]
    DuplicateSession(Uuid),

    /// No session known under this identifier
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// Session exists but holds no indexed chunks
    #[error("Session {0} has no indexed chunks")]
    EmptyIndex(Uuid),

    /// Embedding or language-model service unreachable or erroring
    #[error("Dependency unavailable: {0}")]
    Dependency(String),

    /// Language-model call exhausted its retries
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Upload exceeds the configured size limit
    #[error("File too large: {size} bytes (limit {limit})")]
    QuotaExceeded { size: u64, limit: u64 },

    /// Vector index invariant violation or storage corruption
    #[error("Vector index error: {0}")]
    Index(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a parse error
    pub fn parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a dependency error
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create a vector index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::Parse { .. } => "parse_error",
            Self::EmptyDocument(_) => "empty_document",
            Self::DuplicateSession(_) => "duplicate_session",
            Self::SessionNotFound(_) => "session_not_found",
            Self::EmptyIndex(_) => "empty_index",
            Self::Dependency(_) => "dependency_error",
            Self::Generation(_) => "generation_error",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::Index(_) => "index_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    /// Whether the failure was caused by caller input rather than this
    /// system or its external dependencies.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::Parse { .. }
                | Self::EmptyDocument(_)
                | Self::SessionNotFound(_)
                | Self::EmptyIndex(_)
                | Self::QuotaExceeded { .. }
        )
    }
}
