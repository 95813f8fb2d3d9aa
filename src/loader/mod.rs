//! 코퍼스 로더 모듈
//!
//! 로컬 파일 또는 웹 페이지를 [`Document`]로 읽어옵니다.
//! - 텍스트 파일: 그대로 읽기
//! - PDF 파일: pdf-extract로 페이지별 추출
//! - URL: HTML에서 본문 텍스트 추출 ([`WebLoader`])

mod pdf;
mod web;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

pub use web::WebLoader;

// ============================================================================
// Document
// ============================================================================

/// 로드된 문서
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 본문 텍스트
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

/// 문서 메타데이터
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetadata {
    /// 원본 소스 (파일 경로 또는 URL)
    pub source: String,
    /// 제목 (웹 페이지 `<title>`, PDF 페이지 표기 등)
    pub title: Option<String>,
}

impl Document {
    pub fn new(page_content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                title: None,
            },
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.metadata.title = title;
        self
    }
}

// ============================================================================
// TextLoader
// ============================================================================

/// 로컬 파일 로더
pub struct TextLoader;

impl TextLoader {
    /// 파일에서 문서 로드
    ///
    /// `.pdf`는 페이지마다 하나의 문서, 그 외 파일은 UTF-8 텍스트 하나의 문서로 읽습니다.
    pub async fn load(path: &Path) -> Result<Vec<Document>> {
        let source = path.display().to_string();

        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            let owned = path.to_path_buf();
            let pages = tokio::task::spawn_blocking(move || pdf::extract_pages(&owned))
                .await
                .context("PDF extraction task panicked")??;

            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("document.pdf")
                .to_string();

            let docs = pages
                .into_iter()
                .map(|(page, text)| {
                    Document::new(text, source.clone())
                        .with_title(Some(format!("{} (Page {})", file_name, page)))
                })
                .collect::<Vec<_>>();

            tracing::info!("Loaded {} page(s) from {}", docs.len(), source);
            return Ok(docs);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file: {}", source))?;

        tracing::info!("Loaded {} ({} chars)", source, content.chars().count());
        Ok(vec![Document::new(content, source)])
    }
}

// ============================================================================
// Sample FAQ
// ============================================================================

/// 샘플 FAQ (기본 코퍼스 파일이 없을 때 생성)
pub const SAMPLE_FAQ: &str = "
RAG FAQ Bot

Q: What is RAG?
A: Retrieval-Augmented Generation. Load your document, split it into chunks, embed the chunks, search them with a vector index, and let the LLM answer from YOUR docs only.

Q: Tech stack?
A: Rust + axum + LanceDB + Ollama (llama3.2 for answers, all-minilm for embeddings).

Q: How to add more docs?
A: Put a new text or PDF file in data/, run `faq-rag ingest --file <path>`, then query the /chat endpoint.

Q: Deployment?
A: Run `faq-rag serve` and point the frontend (or curl) at http://localhost:8000.
";

/// 기본 FAQ 파일 보장
///
/// 파일이 없으면 샘플 FAQ를 생성하고 `true`를 반환합니다.
pub async fn ensure_sample_faq(path: &Path) -> Result<bool> {
    let exists = tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("Failed to check {}", path.display()))?;
    if exists {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create corpus directory")?;
        }
    }

    tokio::fs::write(path, SAMPLE_FAQ)
        .await
        .with_context(|| format!("Failed to write sample FAQ: {}", path.display()))?;

    tracing::info!("Created sample FAQ at {}", path.display());
    Ok(true)
}

// ============================================================================
// Tests
// ============================================================================
