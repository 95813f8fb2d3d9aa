//! 인제스트 파이프라인
//!
//! 로더 → 청커 → 임베딩 → 새 인덱스 세대 순서로 코퍼스를 인덱싱합니다.
//! 어느 단계에서 실패해도 기존 활성 인덱스는 그대로 남습니다.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{recursive_chunker, split_documents, ChunkConfig, IndexStore, VectorIndex};
use crate::loader::{Document, TextLoader, WebLoader};

// ============================================================================
// Types
// ============================================================================

/// 인제스트 단계별 에러
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to load {source_name}: {error:#}")]
    Load {
        source_name: String,
        error: anyhow::Error,
    },
    #[error("no text to index in {0}")]
    EmptyCorpus(String),
    #[error("invalid chunking config: {0:#}")]
    Chunking(anyhow::Error),
    #[error("embedding failed: {0:#}")]
    Embed(anyhow::Error),
    #[error("failed to build index: {0:#}")]
    Index(anyhow::Error),
}

/// 인제스트 결과 요약
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub documents: usize,
    pub chunks: usize,
    pub table: String,
}

// ============================================================================
// IngestPipeline
// ============================================================================

/// 코퍼스 → 인덱스 빌더
pub struct IngestPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<IndexStore>,
}

impl IngestPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<IndexStore>) -> Self {
        Self { embedder, store }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// 로컬 파일 인덱싱
    pub async fn ingest_file(
        &self,
        path: &Path,
        config: ChunkConfig,
    ) -> Result<(VectorIndex, IngestReport), IngestError> {
        let source = path.display().to_string();
        let docs = TextLoader::load(path)
            .await
            .map_err(|error| IngestError::Load {
                source_name: source.clone(),
                error,
            })?;
        self.ingest_documents(&source, &docs, config).await
    }

    /// 웹 페이지 인덱싱
    pub async fn ingest_url(
        &self,
        url: &str,
        config: ChunkConfig,
    ) -> Result<(VectorIndex, IngestReport), IngestError> {
        let load_error = |error| IngestError::Load {
            source_name: url.to_string(),
            error,
        };
        let loader = WebLoader::new().map_err(load_error)?;
        let docs = loader.load(url).await.map_err(load_error)?;
        self.ingest_documents(url, &docs, config).await
    }

    /// 문서 목록 인덱싱 (split → embed → build)
    pub async fn ingest_documents(
        &self,
        source: &str,
        docs: &[Document],
        config: ChunkConfig,
    ) -> Result<(VectorIndex, IngestReport), IngestError> {
        let chunker = recursive_chunker(config).map_err(IngestError::Chunking)?;
        let chunks = split_documents(chunker.as_ref(), docs);
        if chunks.is_empty() {
            return Err(IngestError::EmptyCorpus(source.to_string()));
        }

        tracing::info!(
            "Split {} document(s) from {} into {} chunks (size={}, overlap={})",
            docs.len(),
            source,
            chunks.len(),
            config.chunk_size,
            config.chunk_overlap
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_documents(&texts)
            .await
            .map_err(IngestError::Embed)?;

        let index = self
            .store
            .build(&chunks, vectors, self.embedder.model())
            .await
            .map_err(IngestError::Index)?;

        let report = IngestReport {
            source: source.to_string(),
            documents: docs.len(),
            chunks: chunks.len(),
            table: index.manifest().table.clone(),
        };

        Ok((index, report))
    }
}

// ============================================================================
// Tests
// ============================================================================
