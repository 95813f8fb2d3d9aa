//! 설정 모듈
//!
//! TOML 파일(선택) + 환경변수 오버라이드로 서버/인덱스/임베딩/LLM 설정을 로드합니다.
//! 파일이 없으면 기본값을 사용합니다.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::chain::DEFAULT_PROMPT_TEMPLATE;
use crate::knowledge::{ChunkConfig, DEFAULT_TOP_K};

/// 기본 설정 파일 경로
pub const DEFAULT_CONFIG_PATH: &str = "faq-rag.toml";

// ============================================================================
// Config Types
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub corpus: CorpusConfig,
    pub prompt: PromptConfig,
}

/// HTTP 서버 설정
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 허용 Origin 목록 (`"*"` = 전체 허용)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            cors_origins: vec!["*".into()],
        }
    }
}

/// 벡터 인덱스 설정
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    /// LanceDB 디렉토리 + index.json 위치
    pub dir: PathBuf,
    /// 질의당 검색할 청크 수
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("vectorstore"),
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// 임베딩 프로바이더 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Ollama,
    Gemini,
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            other => bail!("Unknown embedding provider: {other} (expected ollama or gemini)"),
        }
    }
}

impl EmbeddingProviderKind {
    /// 프로바이더별 기본 임베딩 모델
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "all-minilm",
            Self::Gemini => "gemini-embedding-001",
        }
    }
}

/// 임베딩 설정
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    /// Ollama 서버 주소 (gemini일 때는 무시)
    pub base_url: String,
    /// 미설정 시 프로바이더 기본 모델
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Gemini 출력 차원 (768, 1536, 3072)
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            base_url: "http://localhost:11434".into(),
            model: None,
            dimension: 768,
        }
    }
}

impl EmbeddingConfig {
    /// 실제 사용할 모델 이름
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// LLM 설정 (Ollama chat)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2:3b".into(),
            temperature: 0.0,
        }
    }
}

/// 소스 종류별 청킹 설정
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// 로컬 파일 (FAQ 등)
    pub file: ChunkConfig,
    /// 웹 페이지
    pub web: ChunkConfig,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            file: ChunkConfig::for_file(),
            web: ChunkConfig::for_web(),
        }
    }
}

/// 기본 코퍼스 설정
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub faq_path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            faq_path: PathBuf::from("data").join("faq.txt"),
        }
    }
}

/// 프롬프트 템플릿 설정
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptConfig {
    /// `{context}`, `{question}` 플레이스홀더를 포함해야 함
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// TOML 파일에서 설정 로드 (환경변수 오버라이드 적용)
    ///
    /// 파일이 없으면 기본값으로 시작합니다.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_value("FAQ_RAG_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env_parsed::<u16>("FAQ_RAG_PORT") {
            self.server.port = v;
        }
        if let Some(v) = env_value("FAQ_RAG_INDEX_DIR") {
            self.index.dir = PathBuf::from(v);
        }
        if let Some(v) = env_parsed::<usize>("FAQ_RAG_TOP_K") {
            self.index.top_k = v;
        }
        if let Some(v) = env_parsed::<EmbeddingProviderKind>("FAQ_RAG_EMBED_PROVIDER") {
            self.embedding.provider = v;
        }
        if let Some(v) = env_value("FAQ_RAG_EMBED_URL") {
            self.embedding.base_url = v;
        }
        if let Some(v) = env_value("FAQ_RAG_EMBED_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Some(v) = env_value("FAQ_RAG_LLM_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = env_value("FAQ_RAG_LLM_MODEL") {
            self.llm.model = v;
        }
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.index.top_k == 0 {
            bail!("index.top_k must be at least 1");
        }
        self.chunking.file.validate().context("Invalid chunking.file")?;
        self.chunking.web.validate().context("Invalid chunking.web")?;

        for placeholder in ["{context}", "{question}"] {
            if !self.prompt.template.contains(placeholder) {
                bail!("prompt.template must contain {placeholder}");
            }
        }
        Ok(())
    }

    /// 서버 바인드 주소 (`host:port`)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 비어있지 않은 환경변수 값
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// 환경변수를 파싱 (실패 시 경고 후 무시)
fn env_parsed<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_value(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Ignoring invalid {}={:?}: {}", key, raw, e);
            None
        }
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// Gemini API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY`
/// 2. `GOOGLE_AI_API_KEY`
pub fn get_api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Some(key) = env_value(var) {
            tracing::debug!("Using API key from {}", var);
            return Ok(key);
        }
    }

    bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

// ============================================================================
// Tests
// ============================================================================
