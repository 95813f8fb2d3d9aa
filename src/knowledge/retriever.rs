//! Retriever - 질문과 가장 가까운 청크 k개 검색

use std::sync::Arc;

use anyhow::{bail, Result};
use thiserror::Error;

use crate::embedding::EmbeddingProvider;

use super::index::{ScoredChunk, VectorIndex};

/// 기본 검색 개수
pub const DEFAULT_TOP_K: usize = 2;

/// 검색 단계별 에러
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// 질의 임베딩 실패 (임베딩 서버)
    #[error("failed to embed question: {0:#}")]
    Embed(anyhow::Error),
    /// 인덱스 검색 실패 (LanceDB, 차원 불일치 등)
    #[error("index search failed: {0:#}")]
    Search(anyhow::Error),
}

/// 벡터 인덱스 + 질의 임베딩 검색기
#[derive(Clone)]
pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    k: usize,
}

impl Retriever {
    /// 검색기 생성
    ///
    /// 질의 임베딩 모델이 인덱스를 만든 모델과 다르면 에러입니다.
    pub fn new(index: VectorIndex, embedder: Arc<dyn EmbeddingProvider>, k: usize) -> Result<Self> {
        let indexed_with = &index.manifest().embedding_model;
        if indexed_with != embedder.model() {
            bail!(
                "Index {} was built with embedding model '{}', but the configured model is '{}'. Re-ingest the corpus.",
                index.manifest().table,
                indexed_with,
                embedder.model()
            );
        }

        Ok(Self { index, embedder, k })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// 질문 관련 청크 검색
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let query = self
            .embedder
            .embed_query(question)
            .await
            .map_err(RetrievalError::Embed)?;
        let results = self
            .index
            .search(&query, self.k)
            .await
            .map_err(RetrievalError::Search)?;

        tracing::debug!(
            "Retrieved {} chunk(s) for question ({} chars)",
            results.len(),
            question.chars().count()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::test_support::{build_index, KeywordEmbedding};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_retrieve_top_k() {
        let dir = TempDir::new().unwrap();
        let embedder = Arc::new(KeywordEmbedding);
        let index = build_index(
            dir.path(),
            &["rust is a language", "lancedb stores vectors", "ollama runs models"],
        )
        .await;

        let retriever = Retriever::new(index, embedder, 2).unwrap();
        let results = retriever.retrieve("where are vectors stored").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "lancedb stores vectors");
    }

    #[tokio::test]
    async fn test_retrieve_errors_are_classified() {
        struct FailingEmbedding;

        #[async_trait::async_trait]
        impl EmbeddingProvider for FailingEmbedding {
            async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                bail!("connection refused")
            }
            fn model(&self) -> &str {
                "keyword"
            }
            fn name(&self) -> &str {
                "failing"
            }
        }

        // 같은 모델 이름이지만 차원이 다른 임베딩
        struct ShortEmbedding;

        #[async_trait::async_trait]
        impl EmbeddingProvider for ShortEmbedding {
            async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
            fn model(&self) -> &str {
                "keyword"
            }
            fn name(&self) -> &str {
                "short"
            }
        }

        let dir = TempDir::new().unwrap();
        let index = build_index(dir.path(), &["rust is a language"]).await;

        let retriever = Retriever::new(index.clone(), Arc::new(FailingEmbedding), 2).unwrap();
        assert!(matches!(
            retriever.retrieve("rust?").await,
            Err(RetrievalError::Embed(_))
        ));

        let retriever = Retriever::new(index, Arc::new(ShortEmbedding), 2).unwrap();
        assert!(matches!(
            retriever.retrieve("rust?").await,
            Err(RetrievalError::Search(_))
        ));
    }

    #[tokio::test]
    async fn test_model_mismatch_rejected() {
        struct OtherModel;

        #[async_trait::async_trait]
        impl EmbeddingProvider for OtherModel {
            async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
            }
            fn model(&self) -> &str {
                "other-model"
            }
            fn name(&self) -> &str {
                "other"
            }
        }

        let dir = TempDir::new().unwrap();
        let index = build_index(dir.path(), &["rust"]).await;
        let result = Retriever::new(index, Arc::new(OtherModel), DEFAULT_TOP_K);
        assert!(result.is_err());
    }
}
