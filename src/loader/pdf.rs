//! PDF 텍스트 추출
//!
//! pdf-extract 크레이트로 PDF에서 텍스트를 추출합니다.

use std::path::Path;

use anyhow::{Context, Result};

/// PDF에서 페이지별 텍스트 추출
///
/// (페이지 번호, 텍스트) 목록을 반환합니다. 페이지 번호는 1부터 시작하며,
/// 텍스트가 없는 페이지는 건너뜁니다.
pub(super) fn extract_pages(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(split_pages(&text))
}

/// 폼피드(`\x0c`)로 페이지 분리
fn split_pages(text: &str) -> Vec<(usize, String)> {
    text.split('\x0c')
        .enumerate()
        .filter_map(|(i, page)| {
            let page = page.trim();
            (!page.is_empty()).then(|| (i + 1, page.to_string()))
        })
        .collect()
}
