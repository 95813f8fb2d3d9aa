//! Text Chunking Module
//!
//! 재귀 문자 분할(Recursive Character Splitting)을 제공합니다.
//! 문단 → 줄 → 단어 → 문자 순서로 구분자를 낮춰가며
//! `chunk_size` 이하의 청크로 나누고, 인접 청크 사이에 `chunk_overlap`만큼 겹칩니다.
//!
//! 길이는 모두 문자(char) 단위입니다.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::loader::Document;

/// 기본 구분자 (우선순위 순)
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 오버랩 크기 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::for_file()
    }
}

impl ChunkConfig {
    /// 로컬 FAQ/텍스트 파일용 설정
    pub fn for_file() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }

    /// 웹 페이지용 설정 (긴 본문)
    pub fn for_web() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if self.chunk_overlap > self.chunk_size {
            bail!(
                "chunk_overlap ({}) must not exceed chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

/// 문서에서 잘라낸 청크
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 청크 텍스트
    pub text: String,
    /// 원본 소스 (파일 경로 또는 URL)
    pub source: String,
    /// 원본 문서 제목
    pub title: Option<String>,
    /// 배치 전체에서의 순번 (0-based)
    pub chunk_index: usize,
}

/// 문서 목록을 청크로 분할
///
/// `chunk_index`는 문서 경계를 넘어 0부터 연속으로 매겨집니다.
pub fn split_documents(chunker: &dyn Chunker, docs: &[Document]) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for doc in docs {
        for text in chunker.chunk(&doc.page_content) {
            chunks.push(Chunk {
                text,
                source: doc.metadata.source.clone(),
                title: doc.metadata.title.clone(),
                chunk_index: chunks.len(),
            });
        }
    }

    chunks
}

// ============================================================================
// RecursiveCharacterSplitter
// ============================================================================

/// 재귀 문자 분할기
///
/// 텍스트에 존재하는 첫 번째 구분자로 나눈 뒤,
/// 여전히 큰 조각은 다음 구분자로 재귀 분할합니다.
/// 구분자는 뒤 조각의 앞에 붙은 채로 유지됩니다.
pub struct RecursiveCharacterSplitter {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// 텍스트를 청크 목록으로 분할 (공백뿐이면 빈 목록)
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // 텍스트에 존재하는 첫 구분자 선택
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good_splits: Vec<&str> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(piece.to_string());
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// 작은 조각들을 `chunk_size` 이하 윈도우로 병합
    ///
    /// 윈도우를 내보낼 때 앞쪽 조각을 버려서
    /// 남은 꼬리가 `chunk_overlap` 이하가 되도록 합니다 (= 오버랩).
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > size && !current.is_empty() {
                if total > size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        size
                    );
                }

                if let Some(doc) = join_trimmed(&current) {
                    docs.push(doc);
                }

                while total > overlap || (total + len > size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_trimmed(&current) {
            docs.push(doc);
        }

        docs
    }
}

impl Chunker for RecursiveCharacterSplitter {
    fn chunk(&self, text: &str) -> Vec<String> {
        self.split_text(text)
    }

    fn name(&self) -> &'static str {
        "RecursiveCharacterSplitter"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자 위치에서 분할 (구분자는 뒤 조각의 앞에 유지, 빈 조각 제거)
///
/// 구분자가 `""`이면 문자 단위로 분할합니다.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// 조각 연결 후 양끝 공백 제거 (비어있으면 None)
fn join_trimmed(pieces: &std::collections::VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 설정으로 청커 생성
pub fn recursive_chunker(config: ChunkConfig) -> Result<Box<dyn Chunker>> {
    Ok(Box::new(RecursiveCharacterSplitter::new(config)?))
}

// ============================================================================
// Tests
// ============================================================================
