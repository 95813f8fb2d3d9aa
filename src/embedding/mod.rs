//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 청크와 질문을 고정 길이 벡터로 변환하는 프로바이더입니다.
//! - [`OllamaEmbedding`]: 로컬 Ollama (`all-minilm` = all-MiniLM-L6-v2, 384차원)
//! - [`GeminiEmbedding`]: Google Gemini API
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(&config.embedding)?;
//! let vectors = embedder.embed_documents(&chunks).await?;
//! let query = embedder.embed_query("What is RAG?").await?;
//! ```

mod gemini;
mod ollama;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::{get_api_key, EmbeddingConfig, EmbeddingProviderKind};

pub use gemini::GeminiEmbedding;
pub use ollama::OllamaEmbedding;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 문서(청크)와 질의를 구분해서 임베딩합니다.
/// 구분하지 않는 프로바이더는 `embed_query`를 기본 구현으로 둡니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 문서 배치 임베딩 (입력 순서 유지)
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// 질의 임베딩
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(v) if vectors.is_empty() => Ok(v),
            _ => bail!("Expected exactly one embedding for query"),
        }
    }

    /// 모델 이름 (인덱스 매니페스트에 기록됨)
    fn model(&self) -> &str;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

/// 배치 응답 검증: 개수 일치 + 차원 일치 + 비어있지 않음
pub(crate) fn check_embeddings(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    if vectors.len() != expected {
        bail!(
            "Embedding count mismatch: requested {}, received {}",
            expected,
            vectors.len()
        );
    }

    if let Some(first) = vectors.first() {
        if first.is_empty() {
            bail!("Received empty embedding vector");
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
            bail!(
                "Inconsistent embedding dimensions: {} vs {}",
                first.len(),
                bad.len()
            );
        }
    }

    Ok(())
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 따라 임베딩 프로바이더 생성
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::Ollama => {
            Arc::new(OllamaEmbedding::new(&config.base_url, config.model_name())?)
        }
        EmbeddingProviderKind::Gemini => Arc::new(GeminiEmbedding::with_dimension(
            get_api_key()?,
            config.model_name(),
            config.dimension,
        )?),
    };

    tracing::info!(
        "Using {} embedding (model: {})",
        embedder.name(),
        embedder.model()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
