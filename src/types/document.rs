//! Document, block, and chunk types with source tracking

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported document formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Plain text file
    PlainText,
    /// Markdown file
    Markdown,
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// EPUB ebook
    Epub,
}

impl DocumentFormat {
    /// Detect format from a filename extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "epub" => Some(Self::Epub),
            _ => None,
        }
    }

    /// Detect format from a filename
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit('.').next().unwrap_or("");
        if ext == filename {
            return None;
        }
        Self::from_extension(ext)
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PlainText => "Text File",
            Self::Markdown => "Markdown",
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Epub => "EPUB eBook",
        }
    }
}

/// Where a piece of text came from inside the source document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Locator {
    /// Page or chapter number (1-indexed, for PDF/EPUB)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page: Option<u32>,
    /// Section or chapter title (for Markdown/EPUB)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub section: Option<String>,
    /// Byte offset range in the normalized document text
    pub char_start: usize,
    pub char_end: usize,
}

impl Locator {
    /// Format the locator for display in citations
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();

        if let Some(page) = self.page {
            parts.push(format!("Page {}", page));
        }

        if let Some(section) = &self.section {
            parts.push(format!("Section: {}", section));
        }

        if parts.is_empty() {
            parts.push(format!("Offset {}-{}", self.char_start, self.char_end));
        }

        parts.join(", ")
    }
}

/// A normalized unit of document text (one page, chapter, or section).
///
/// Produced by the normalizer, consumed by the splitter.
#[derive(Debug, Clone)]
pub struct TextBlock {
    /// Position of this block within the document (0-indexed)
    pub block_id: u32,
    /// Normalized text content
    pub text: String,
    /// Source location of the block
    pub locator: Locator,
}

impl TextBlock {
    /// Create a block with no page or section information
    pub fn plain(text: String) -> Self {
        Self {
            block_id: 0,
            text,
            locator: Locator::default(),
        }
    }
}

/// A bounded-length segment of document text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk identifier, zero-padded by position so lexicographic order is
    /// document order
    pub id: String,
    /// Owning session
    pub session_id: Uuid,
    /// Text content
    pub text: String,
    /// Source location for citations
    pub locator: Locator,
    /// Index of the source block this chunk was cut from
    pub block_id: u32,
    /// Chunk position within the document (0-indexed)
    pub chunk_index: u32,
}

impl Chunk {
    /// Create a new chunk; the id is derived from the position
    pub fn new(
        session_id: Uuid,
        chunk_index: u32,
        text: String,
        locator: Locator,
        block_id: u32,
    ) -> Self {
        Self {
            id: format!("{:05}", chunk_index),
            session_id,
            text,
            locator,
            block_id,
            chunk_index,
        }
    }
}

/// Metadata recorded for an uploaded document's session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Opaque session identifier
    pub session_id: Uuid,
    /// Original filename as uploaded
    pub document_name: String,
    /// Declared document format
    pub format: DocumentFormat,
    /// SHA-256 of the normalized text
    pub content_hash: String,
    /// When the session was created
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Number of chunks indexed for this document
    pub chunk_count: u32,
}

impl SessionMeta {
    /// Create metadata for a fresh session
    pub fn new(
        session_id: Uuid,
        document_name: String,
        format: DocumentFormat,
        content_hash: String,
    ) -> Self {
        Self {
            session_id,
            document_name,
            format,
            content_hash,
            created_at: chrono::Utc::now(),
            chunk_count: 0,
        }
    }
}

/// Hash normalized text for dedup and change detection
pub fn hash_content(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("MD"), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::from_extension("epub"), Some(DocumentFormat::Epub));
        assert_eq!(DocumentFormat::from_extension("exe"), None);
    }

    #[test]
    fn test_format_from_filename() {
        assert_eq!(
            DocumentFormat::from_filename("report.final.docx"),
            Some(DocumentFormat::Docx)
        );
        // No extension at all
        assert_eq!(DocumentFormat::from_filename("README"), None);
    }

    #[test]
    fn test_chunk_ids_sort_in_document_order() {
        let session = Uuid::new_v4();
        let a = Chunk::new(session, 2, "a".into(), Locator::default(), 0);
        let b = Chunk::new(session, 10, "b".into(), Locator::default(), 0);
        assert!(a.id < b.id);
    }

    #[test]
    fn test_locator_describe() {
        let loc = Locator {
            page: Some(3),
            section: Some("Intro".into()),
            char_start: 0,
            char_end: 10,
        };
        assert_eq!(loc.describe(), "Page 3, Section: Intro");

        let bare = Locator {
            char_start: 5,
            char_end: 9,
            ..Default::default()
        };
        assert_eq!(bare.describe(), "Offset 5-9");
    }
}
