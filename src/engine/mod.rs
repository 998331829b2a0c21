//! Engine facade: the logical operations served to the transport layer
//!
//! Upload, query, summarize, clear, health. The transport layer supplies
//! raw bytes and questions; everything here stays transport-agnostic.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::{PromptBuilder, Summarizer};
use crate::index::VectorIndex;
use crate::ingestion::{ChunkSplitter, ParserRegistry};
use crate::providers::{EmbeddingProvider, LlmProvider, OllamaProvider};
use crate::session::SessionStore;
use crate::types::{
    hash_content, Chunk, DocumentFormat, HealthStatus, QueryAnswer, SessionMeta, SourceRef,
    SummaryResult, TextBlock, UploadReceipt,
};

/// Retrieval-augmented generation engine over per-session document indexes
pub struct RagEngine {
    config: RagConfig,
    registry: ParserRegistry,
    splitter: ChunkSplitter,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    sessions: SessionStore,
}

impl RagEngine {
    /// Create an engine over explicit provider objects.
    ///
    /// Providers are shared, read-only handles; pass fakes in tests.
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let sessions = SessionStore::new(config.storage.storage_dir.clone())?;
        let splitter = ChunkSplitter::new(&config.chunking);

        Ok(Self {
            config,
            registry: ParserRegistry::with_default_parsers(),
            splitter,
            embedder,
            llm,
            sessions,
        })
    }

    /// Create an engine backed by a local Ollama server.
    ///
    /// `dimensions` is fixed by the configured embedding model
    /// (1024 for mxbai-embed-large).
    pub fn with_ollama(config: RagConfig, dimensions: usize) -> Result<Self> {
        let (embedder, llm) = OllamaProvider::new(&config.llm, dimensions)?.split();
        Self::new(config, Arc::new(embedder), Arc::new(llm))
    }

    /// Session store, for embedders that manage lifecycle directly
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Engine configuration
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Ingest one document into a fresh session.
    ///
    /// Normalizes, chunks, embeds, indexes, and durably persists before
    /// the session identifier is returned, so a returned session is always
    /// queryable. Any failure tears the partial session down; no orphaned
    /// storage is left behind.
    pub async fn upload(&self, data: &[u8], filename: &str) -> Result<UploadReceipt> {
        if data.len() as u64 > self.config.storage.max_upload_bytes {
            return Err(Error::QuotaExceeded {
                size: data.len() as u64,
                limit: self.config.storage.max_upload_bytes,
            });
        }

        let format = DocumentFormat::from_filename(filename).ok_or_else(|| {
            let ext = filename.rsplit('.').next().unwrap_or(filename);
            Error::UnsupportedFormat(ext.to_string())
        })?;

        let blocks = self.registry.normalize(format, filename, data)?;

        let full_text: String = blocks.iter().map(|b| b.text.as_str()).collect();
        let meta = SessionMeta::new(
            Uuid::new_v4(),
            filename.to_string(),
            format,
            hash_content(&full_text),
        );
        let session_id = self.sessions.create_session(meta)?;

        match self.ingest(session_id, &blocks).await {
            Ok(chunk_count) => {
                tracing::info!(
                    session_id = %session_id,
                    filename,
                    chunk_count,
                    "document ingested"
                );
                Ok(UploadReceipt {
                    session_id,
                    document_name: filename.to_string(),
                    format,
                    chunk_count,
                })
            }
            Err(e) => {
                // Never leave a half-built session behind
                if let Err(cleanup) = self.sessions.destroy(session_id) {
                    tracing::warn!(session_id = %session_id, "cleanup failed: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// Build, persist, and install the session's index
    async fn ingest(&self, session_id: Uuid, blocks: &[TextBlock]) -> Result<u32> {
        let chunks = self.splitter.split(session_id, blocks);
        if chunks.is_empty() {
            return Err(Error::EmptyDocument(session_id.to_string()));
        }

        let vectors = self.embed_chunks(&chunks).await?;

        let mut index = VectorIndex::new(session_id);
        for (chunk, vector) in chunks.iter().zip(vectors) {
            index.upsert(chunk, vector)?;
        }

        // Durable before visible: a query never sees a partial index
        index.persist(self.sessions.storage_dir())?;
        let chunk_count = index.len() as u32;
        self.sessions.install_index(session_id, index)?;

        Ok(chunk_count)
    }

    /// Embed chunk texts in batches to amortize per-call latency
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let batch_size = self.config.llm.embed_batch_size.max(1);

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            vectors.extend(self.embedder.embed_batch(batch).await?);
        }

        Ok(vectors)
    }

    /// Answer a question from the session's document.
    ///
    /// Returns the answer together with the sources actually included in
    /// the model's context, in rank order.
    pub async fn query(&self, session_id: Uuid, question: &str) -> Result<QueryAnswer> {
        let handle = self.sessions.get(session_id)?;

        if handle.index.read().is_empty() {
            return Err(Error::EmptyIndex(session_id));
        }

        let query_vector = self.embedder.embed(question).await?;

        let hits = handle
            .index
            .read()
            .search(&query_vector, self.config.retrieval.top_k)?;

        let (context, included) =
            PromptBuilder::assemble_context(&hits, self.config.retrieval.context_budget_chars);

        let prompt = PromptBuilder::build_qa_prompt(question, &context);
        let answer = self.llm.generate(&prompt).await?;

        let sources = included
            .into_iter()
            .map(|hit| SourceRef {
                chunk_id: hit.chunk_id,
                locator: hit.locator,
                snippet: hit.text,
                score: hit.score,
            })
            .collect();

        Ok(QueryAnswer { answer, sources })
    }

    /// Summarize the session's whole document via map-reduce, covering
    /// every chunk rather than a single top-K retrieval
    pub async fn summarize(&self, session_id: Uuid) -> Result<SummaryResult> {
        let handle = self.sessions.get(session_id)?;

        let chunk_texts: Vec<String> = {
            let index = handle.index.read();
            if index.is_empty() {
                return Err(Error::EmptyIndex(session_id));
            }
            index
                .chunks_in_order()
                .map(|(_, entry)| entry.text.clone())
                .collect()
        };

        let summarizer = Summarizer::new(
            self.llm.as_ref(),
            self.config.retrieval.context_budget_chars,
        );
        let (summary, batches) = summarizer.summarize(&chunk_texts).await?;

        Ok(SummaryResult { summary, batches })
    }

    /// Destroy a session's index and metadata; idempotent
    pub fn clear(&self, session_id: Uuid) -> Result<()> {
        self.sessions.destroy(session_id)
    }

    /// Probe the external services
    pub async fn health(&self) -> HealthStatus {
        let (embedding, generation) =
            tokio::join!(self.embedder.health_check(), self.llm.health_check());

        HealthStatus {
            embedding_service_reachable: embedding.unwrap_or(false),
            generation_service_reachable: generation.unwrap_or(false),
        }
    }
}
