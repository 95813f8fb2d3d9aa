//! CLI 모듈
//!
//! faq-rag 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{has_api_key, Config, EmbeddingProviderKind, DEFAULT_CONFIG_PATH};
use crate::pipeline::IngestReport;
use crate::server;
use crate::service::RagService;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "faq-rag")]
#[command(version, about = "로컬 RAG FAQ 봇", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTP 서버 실행
    Serve {
        /// 바인드 주소 (설정 파일보다 우선)
        #[arg(long)]
        host: Option<String>,

        /// 포트 (설정 파일보다 우선)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// 파일 또는 URL 인덱싱 (인자가 없으면 기본 FAQ 파일)
    Ingest {
        /// 인덱싱할 파일 경로 (텍스트 또는 PDF)
        #[arg(short, long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// 인덱싱할 웹 페이지 URL
        #[arg(short, long)]
        url: Option<String>,
    },

    /// 질문하기
    Ask {
        /// 질문
        question: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(config, host, port).await,
        Commands::Ingest { file, url } => cmd_ingest(config, file, url).await,
        Commands::Ask { question } => cmd_ask(config, &question).await,
        Commands::Status => cmd_status(config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 서버 실행 명령어 (serve)
async fn cmd_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    ensure_api_key(&config)?;
    println!("[*] 서버 시작: http://{}", config.bind_addr());
    server::serve(config).await
}

/// 인덱싱 명령어 (ingest)
///
/// 성공하면 기존 인덱스를 새 인덱스로 교체합니다.
async fn cmd_ingest(config: Config, file: Option<PathBuf>, url: Option<String>) -> Result<()> {
    ensure_api_key(&config)?;
    let service = RagService::new(config).await?;

    let report = if let Some(ref url) = url {
        println!("[*] 웹 페이지 인덱싱 중: {}", url);
        service.ingest_url(url).await?
    } else if let Some(ref path) = file {
        println!("[*] 파일 인덱싱 중: {}", path.display());
        service.ingest_file(path).await?
    } else {
        let path = &service.config().corpus.faq_path;
        println!("[*] 기본 FAQ 인덱싱 중: {}", path.display());
        service.ingest_default().await?
    };

    print_report(&report);
    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: Config, question: &str) -> Result<()> {
    ensure_api_key(&config)?;
    let service = RagService::new(config).await?;

    if !service.load_existing().await? {
        bail!("인덱스가 없습니다. 먼저 `faq-rag ingest`를 실행하세요.");
    }

    println!("[*] 질문: \"{}\"", question);
    let answer = service.ask(question).await.context("답변 생성 실패")?;

    println!("\n{}\n", answer.answer.trim());

    if !answer.sources.is_empty() {
        println!("[OK] 참고한 청크 ({} 건):", answer.sources.len());
        for (i, source) in answer.sources.iter().enumerate() {
            let label = source.title.as_deref().unwrap_or(&source.source);
            println!(
                "  {}. [점수: {:.4}] {} #{}",
                i + 1,
                source.score,
                truncate_text(label, 60),
                source.chunk_index
            );
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: Config) -> Result<()> {
    println!("faq-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 인덱스 디렉토리: {}", config.index.dir.display());
    println!(
        "[*] 임베딩: {:?} / {}",
        config.embedding.provider,
        config.embedding.model_name()
    );
    println!("[*] LLM: {} ({})", config.llm.model, config.llm.base_url);

    if config.embedding.provider == EmbeddingProviderKind::Gemini {
        if has_api_key() {
            println!("[OK] API 키: 설정됨");
        } else {
            println!("[!] API 키: 미설정");
            println!("    설정: export GEMINI_API_KEY=your-key");
            return Ok(());
        }
    }

    let service = RagService::new(config).await?;
    service.load_existing().await?;

    match service.status().await.manifest {
        Some(manifest) => {
            println!(
                "[OK] 활성 인덱스: {} ({} 청크, {}차원)",
                manifest.table, manifest.chunk_count, manifest.dimension
            );
            println!("     모델: {}", manifest.embedding_model);
            println!(
                "     생성: {}",
                manifest.created_at.format("%Y-%m-%d %H:%M")
            );
            for source in &manifest.sources {
                println!("     소스: {}", source);
            }
        }
        None => {
            println!("[!] 활성 인덱스 없음");
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Gemini 임베딩 사용 시 API 키 확인
fn ensure_api_key(config: &Config) -> Result<()> {
    if config.embedding.provider == EmbeddingProviderKind::Gemini && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

fn print_report(report: &IngestReport) {
    println!(
        "[OK] 인덱싱 완료: 문서 {} 개, 청크 {} 개",
        report.documents, report.chunks
    );
    println!("     소스: {}", report.source);
    println!("     테이블: {}", report.table);
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
