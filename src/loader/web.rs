//! 웹 로더 - URL 콘텐츠 추출
//!
//! 페이지를 가져와 제목과 본문 텍스트를 추출합니다.
//! script/style 등 보이지 않는 요소의 텍스트는 제외합니다.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use scraper::{ElementRef, Html, Selector};

use super::Document;

/// 텍스트 추출에서 제외할 요소
const HIDDEN_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

/// 웹 페이지 로더
pub struct WebLoader {
    client: reqwest::Client,
}

impl WebLoader {
    /// 새 로더 생성
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("faq-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self { client })
    }

    /// URL에서 문서 로드
    ///
    /// 항상 하나의 문서를 반환하며, 보이는 텍스트가 없으면 에러입니다.
    pub async fn load(&self, url: &str) -> Result<Vec<Document>> {
        let parsed = url::Url::parse(url.trim()).with_context(|| format!("Invalid URL: {url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("Unsupported URL scheme: {}", parsed.scheme());
        }

        tracing::info!("Loading page: {}", parsed);

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .context("HTTP 요청 실패")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Failed to fetch {}: HTTP {}", parsed, status);
        }

        let html = response.text().await.context("응답 본문 읽기 실패")?;
        let document = Html::parse_document(&html);

        let title = extract_title(&document);
        let content = extract_content(&document);

        if content.is_empty() {
            bail!("No readable text found at {}", parsed);
        }

        tracing::info!(
            "Loaded page {} ({} chars, title={:?})",
            parsed,
            content.chars().count(),
            title
        );

        Ok(vec![Document::new(content, url.trim()).with_title(title)])
    }
}

/// 제목 추출 (`<title>` → 첫 `<h1>`)
fn extract_title(document: &Html) -> Option<String> {
    for selector_str in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let title = visible_text(&element);
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }
    None
}

/// 본문 추출 (`<body>` 전체의 보이는 텍스트, body가 없으면 문서 전체)
fn extract_content(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());

    match body {
        Some(body) => visible_text(&body),
        None => visible_text(&document.root_element()),
    }
}

/// 요소의 보이는 텍스트 (연속 공백 정리)
fn visible_text(element: &ElementRef) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
