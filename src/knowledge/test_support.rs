//! 테스트용 결정적 임베딩/언어 모델

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::llm::ChatModel;

use super::{Chunk, IndexStore, VectorIndex};

/// 키워드 사전
const VOCABULARY: [&str; 10] = [
    "rust", "language", "lancedb", "vector", "stor", "ollama", "model", "rag", "answer", "chunk",
];

/// 단어가 사전 항목을 포함하는 횟수로 벡터를 만드는 임베딩
pub(crate) struct KeywordEmbedding;

impl KeywordEmbedding {
    pub(crate) fn vectorize(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCABULARY
            .iter()
            .map(|term| lower.split_whitespace().filter(|w| w.contains(term)).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedding {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    fn model(&self) -> &str {
        "keyword"
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// 텍스트 목록으로 인덱스 생성
pub(crate) async fn build_index(dir: &Path, texts: &[&str]) -> VectorIndex {
    let store = IndexStore::open(dir).await.unwrap();
    let chunks: Vec<Chunk> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk {
            text: t.to_string(),
            source: "test".to_string(),
            title: None,
            chunk_index: i,
        })
        .collect();
    let vectors = texts.iter().map(|t| KeywordEmbedding::vectorize(t)).collect();
    store.build(&chunks, vectors, "keyword").await.unwrap()
}

/// 받은 프롬프트를 기록하고 고정 답변을 돌려주는 모델
pub(crate) struct RecordingModel {
    pub(crate) reply: String,
    pub(crate) prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub(crate) fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
