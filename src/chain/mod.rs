//! 답변 체인
//!
//! retriever → 컨텍스트 포맷 → 프롬프트 → LLM → 문자열 파서
//! 순서로 고정된 선형 파이프라인입니다.

mod prompt;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::knowledge::{RetrievalError, Retriever, ScoredChunk};
use crate::llm::ChatModel;

pub use prompt::{PromptTemplate, DEFAULT_PROMPT_TEMPLATE};

/// 컨텍스트 블록의 청크 구분자
const CONTEXT_SEPARATOR: &str = "\n\n";

// ============================================================================
// Types
// ============================================================================

/// 체인 실행 에러
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error("failed to generate answer: {0:#}")]
    Generate(anyhow::Error),
}

/// 답변 + 근거 청크
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// 답변에 사용된 청크 참조
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub chunk_index: usize,
    pub score: f32,
}

impl From<&ScoredChunk> for SourceRef {
    fn from(chunk: &ScoredChunk) -> Self {
        Self {
            source: chunk.source.clone(),
            title: chunk.title.clone(),
            chunk_index: chunk.chunk_index,
            score: chunk.score,
        }
    }
}

/// 검색된 청크 텍스트를 하나의 컨텍스트 블록으로 연결
pub fn format_docs(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// 문자열 출력 파서 (모델 텍스트를 그대로 사용)
pub fn parse_output(raw: String) -> String {
    raw
}

// ============================================================================
// RagChain
// ============================================================================

/// RAG 체인
#[derive(Clone)]
pub struct RagChain {
    retriever: Retriever,
    prompt: PromptTemplate,
    llm: Arc<dyn ChatModel>,
}

impl RagChain {
    pub fn new(retriever: Retriever, prompt: PromptTemplate, llm: Arc<dyn ChatModel>) -> Self {
        Self {
            retriever,
            prompt,
            llm,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// 질문 → 답변 텍스트
    pub async fn invoke(&self, question: &str) -> Result<String, ChainError> {
        Ok(self.ask(question).await?.answer)
    }

    /// 질문 → 답변 + 근거
    pub async fn ask(&self, question: &str) -> Result<Answer, ChainError> {
        let chunks = self.retriever.retrieve(question).await?;

        let context = format_docs(&chunks);
        let prompt = self.prompt.format(&context, question);

        tracing::debug!(
            "Prompting {} with {} chunk(s), {} chars",
            self.llm.name(),
            chunks.len(),
            prompt.chars().count()
        );

        let raw = self
            .llm
            .generate(&prompt)
            .await
            .map_err(ChainError::Generate)?;

        Ok(Answer {
            answer: parse_output(raw),
            sources: chunks.iter().map(SourceRef::from).collect(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
