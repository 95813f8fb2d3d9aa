//! faq-rag - 로컬 RAG FAQ 봇
//!
//! 문서(텍스트/PDF/웹 페이지)를 청크로 나눠 LanceDB에 임베딩으로 저장하고,
//! 질문과 가까운 청크를 컨텍스트로 Ollama 모델이 답변하는 RAG 서비스입니다.

pub mod chain;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod knowledge;
pub mod llm;
pub mod loader;
pub mod pipeline;
pub mod server;
pub mod service;

// Re-exports
pub use chain::{Answer, ChainError, PromptTemplate, RagChain, SourceRef};
pub use config::{get_api_key, has_api_key, Config};
pub use embedding::{create_embedder, EmbeddingProvider, GeminiEmbedding, OllamaEmbedding};
pub use knowledge::{
    recursive_chunker, Chunk, ChunkConfig, Chunker, IndexManifest, IndexStore,
    RecursiveCharacterSplitter, RetrievalError, Retriever, ScoredChunk, VectorIndex,
};
pub use llm::{ChatModel, OllamaChat};
pub use loader::{Document, TextLoader, WebLoader};
pub use pipeline::{IngestError, IngestPipeline, IngestReport};
pub use service::{RagService, ServiceError, ServiceStatus};
