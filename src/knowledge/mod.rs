//! Knowledge 모듈 - RAG 인덱스 수명주기
//!
//! - Chunker: 재귀 문자 분할 (오버랩 포함)
//! - Index: LanceDB 세대 테이블 + `index.json` 매니페스트
//! - Retriever: 질의 임베딩 → top-k 청크

mod chunker;
mod index;
mod retriever;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use chunker::{
    recursive_chunker, split_documents, Chunk, ChunkConfig, Chunker, RecursiveCharacterSplitter,
    DEFAULT_SEPARATORS,
};
pub use index::{IndexManifest, IndexStore, ScoredChunk, VectorIndex};
pub use retriever::{RetrievalError, Retriever, DEFAULT_TOP_K};
