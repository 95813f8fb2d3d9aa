//! RAG 서비스 - 활성 체인 보관
//!
//! 현재 인덱스에 바인딩된 [`RagChain`] 하나를 보관합니다.
//! 인제스트는 한 번에 하나씩만 실행되고, 성공하면 새 체인으로 교체됩니다.
//! 질문은 체인 `Arc`만 복제해 락 밖에서 처리하므로 교체 중에도 막히지 않습니다.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::chain::{Answer, ChainError, PromptTemplate, RagChain};
use crate::config::Config;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::knowledge::{IndexManifest, IndexStore, Retriever, VectorIndex};
use crate::llm::{ChatModel, OllamaChat};
use crate::loader::ensure_sample_faq;
use crate::pipeline::{IngestError, IngestPipeline, IngestReport};

// ============================================================================
// Types
// ============================================================================

/// 서비스 에러
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No index loaded yet. Ingest a document first.")]
    NotReady,
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Answer(#[from] ChainError),
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

/// 서비스 상태
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub ready: bool,
    pub manifest: Option<IndexManifest>,
}

// ============================================================================
// RagService
// ============================================================================

pub struct RagService {
    config: Config,
    prompt: PromptTemplate,
    store: Arc<IndexStore>,
    pipeline: IngestPipeline,
    llm: Arc<dyn ChatModel>,
    active: RwLock<Option<Arc<RagChain>>>,
    ingest_lock: Mutex<()>,
}

impl RagService {
    /// 설정으로 서비스 생성 (임베딩/LLM 클라이언트 포함)
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let llm: Arc<dyn ChatModel> = Arc::new(OllamaChat::from_config(&config.llm)?);
        Self::with_components(config, embedder, llm).await
    }

    /// 임베딩/LLM 구현체를 직접 지정해 생성
    pub async fn with_components(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn ChatModel>,
    ) -> anyhow::Result<Self> {
        let prompt = PromptTemplate::new(config.prompt.template.clone())?;
        let store = Arc::new(IndexStore::open(&config.index.dir).await?);
        let pipeline = IngestPipeline::new(embedder, store.clone());

        Ok(Self {
            config,
            prompt,
            store,
            pipeline,
            llm,
            active: RwLock::new(None),
            ingest_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 저장된 인덱스가 있으면 체인 바인딩
    ///
    /// 인덱스가 없거나 현재 임베딩 모델과 맞지 않으면 비어 있는 상태로 남고 `false`를 반환합니다.
    pub async fn load_existing(&self) -> Result<bool, ServiceError> {
        let Some(index) = self.store.load().await.map_err(ServiceError::Internal)? else {
            tracing::info!(
                "No index found in {}, waiting for ingest",
                self.store.dir().display()
            );
            return Ok(false);
        };

        match self.bind_chain(index) {
            Ok(chain) => {
                *self.active.write().await = Some(Arc::new(chain));
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Ignoring stored index: {:#}", e);
                Ok(false)
            }
        }
    }

    /// URL 인덱싱 후 활성 체인 교체
    pub async fn ingest_url(&self, url: &str) -> Result<IngestReport, ServiceError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ServiceError::InvalidInput("url must not be empty".into()));
        }

        let _guard = self.ingest_lock.lock().await;
        let on_disk = self.active_table_on_disk().await;
        let (index, report) = self
            .pipeline
            .ingest_url(url, self.config.chunking.web)
            .await?;
        self.activate(index, on_disk).await?;
        Ok(report)
    }

    /// 로컬 파일 인덱싱 후 활성 체인 교체
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport, ServiceError> {
        let _guard = self.ingest_lock.lock().await;
        let on_disk = self.active_table_on_disk().await;
        let (index, report) = self
            .pipeline
            .ingest_file(path, self.config.chunking.file)
            .await?;
        self.activate(index, on_disk).await?;
        Ok(report)
    }

    /// 기본 FAQ 파일 인덱싱 (없으면 샘플 생성)
    pub async fn ingest_default(&self) -> Result<IngestReport, ServiceError> {
        let path = self.config.corpus.faq_path.clone();
        ensure_sample_faq(&path)
            .await
            .map_err(ServiceError::Internal)?;
        self.ingest_file(&path).await
    }

    /// 질문에 답변
    pub async fn ask(&self, question: &str) -> Result<Answer, ServiceError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ServiceError::InvalidInput(
                "question must not be empty".into(),
            ));
        }

        let chain = self
            .active
            .read()
            .await
            .clone()
            .ok_or(ServiceError::NotReady)?;

        Ok(chain.ask(question).await?)
    }

    pub async fn status(&self) -> ServiceStatus {
        let active = self.active.read().await;
        ServiceStatus {
            ready: active.is_some(),
            manifest: active
                .as_ref()
                .map(|chain| chain.retriever().index().manifest().clone()),
        }
    }

    fn bind_chain(&self, index: VectorIndex) -> anyhow::Result<RagChain> {
        let retriever = Retriever::new(
            index,
            self.pipeline.embedder().clone(),
            self.config.index.top_k,
        )?;
        Ok(RagChain::new(retriever, self.prompt.clone(), self.llm.clone()))
    }

    /// 인제스트 직전 매니페스트가 가리키던 세대 (다른 프로세스가 사용 중일 수 있음)
    async fn active_table_on_disk(&self) -> Option<String> {
        match self.store.manifest().await {
            Ok(manifest) => manifest.map(|m| m.table),
            Err(e) => {
                tracing::warn!("Failed to read index manifest: {:#}", e);
                None
            }
        }
    }

    /// 새 인덱스로 체인 교체 후 오래된 세대 정리
    ///
    /// 교체 직전 세대(메모리의 이전 체인, 디스크의 이전 매니페스트)는 남겨서
    /// 이전 체인으로 처리 중인 질문이 계속 검색할 수 있게 합니다.
    async fn activate(
        &self,
        index: VectorIndex,
        on_disk: Option<String>,
    ) -> Result<(), ServiceError> {
        let table = index.manifest().table.clone();
        let chain = self.bind_chain(index).map_err(ServiceError::Internal)?;

        let previous = {
            let mut active = self.active.write().await;
            active
                .replace(Arc::new(chain))
                .map(|old| old.retriever().index().manifest().table.clone())
        };
        tracing::info!("Activated index {}", table);

        let mut keep = vec![table.as_str()];
        keep.extend(previous.as_deref());
        keep.extend(on_disk.as_deref());

        match self.store.prune(&keep).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Pruned {} stale index table(s)", n),
            Err(e) => tracing::warn!("Failed to prune stale index tables: {:#}", e),
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::test_support::{KeywordEmbedding, RecordingModel};
    use tempfile::TempDir;

    async fn service(dir: &Path, reply: &str) -> RagService {
        let mut config = Config::default();
        config.index.dir = dir.join("vectorstore");
        config.corpus.faq_path = dir.join("data").join("faq.txt");
        RagService::with_components(
            config,
            Arc::new(KeywordEmbedding),
            Arc::new(RecordingModel::new(reply)),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_ask_before_ingest() {
        let dir = TempDir::new().unwrap();
        let service = service(dir.path(), "unused").await;

        assert!(!service.load_existing().await.unwrap());
        assert!(matches!(
            service.ask("what is rag?").await,
            Err(ServiceError::NotReady)
        ));

        let status = service.status().await;
        assert!(!status.ready);
        assert!(status.manifest.is_none());
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let dir = TempDir::new().unwrap();
        let service = service(dir.path(), "unused").await;

        assert!(matches!(
            service.ask("   ").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            service.ingest_url("").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_ingest_default_then_ask() {
        let dir = TempDir::new().unwrap();
        let service = service(dir.path(), "RAG answers from your docs.").await;

        let report = service.ingest_default().await.unwrap();
        assert!(dir.path().join("data").join("faq.txt").exists());
        assert!(report.chunks > 0);

        let answer = service.ask("What is RAG?").await.unwrap();
        assert_eq!(answer.answer, "RAG answers from your docs.");
        assert!(!answer.sources.is_empty());
        assert!(answer.sources.len() <= 2);

        let status = service.status().await;
        assert!(status.ready);
        assert_eq!(status.manifest.unwrap().table, report.table);
    }

    #[tokio::test]
    async fn test_reingest_replaces_and_prunes() {
        let dir = TempDir::new().unwrap();
        let corpus = dir.path().join("notes.txt");
        let service = service(dir.path(), "ok").await;

        let mut reports = Vec::new();
        for text in ["rust is a language", "ollama runs models", "lancedb stores vectors"] {
            std::fs::write(&corpus, text).unwrap();
            reports.push(service.ingest_file(&corpus).await.unwrap());
        }

        let answer = service.ask("where are vectors stored").await.unwrap();
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(
            service.status().await.manifest.unwrap().table,
            reports[2].table
        );

        // 활성 세대 + 직전 세대만 남음
        let store = IndexStore::open(&dir.path().join("vectorstore")).await.unwrap();
        let mut remaining = store.generations().await.unwrap();
        remaining.sort();
        let mut expected = vec![reports[1].table.clone(), reports[2].table.clone()];
        expected.sort();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn test_fresh_process_ingest_keeps_served_generation() {
        let dir = TempDir::new().unwrap();
        let corpus = dir.path().join("notes.txt");
        std::fs::write(&corpus, "rust is a language").unwrap();

        let server = service(dir.path(), "served").await;
        server.ingest_file(&corpus).await.unwrap();
        let served = server.active.read().await.clone().unwrap();

        // 별도 프로세스(CLI)의 인제스트: 메모리에 이전 체인이 없음
        std::fs::write(&corpus, "ollama runs models").unwrap();
        let cli = service(dir.path(), "cli").await;
        cli.ingest_file(&corpus).await.unwrap();

        let answer = served.ask("is rust a language").await.unwrap();
        assert_eq!(answer.answer, "served");
    }

    #[tokio::test]
    async fn test_in_flight_chain_survives_reingest() {
        let dir = TempDir::new().unwrap();
        let corpus = dir.path().join("notes.txt");
        std::fs::write(&corpus, "rust is a language").unwrap();

        let service = service(dir.path(), "still here").await;
        service.ingest_file(&corpus).await.unwrap();

        // 질문 처리 중인 요청이 잡고 있는 체인
        let in_flight = service.active.read().await.clone().unwrap();

        std::fs::write(&corpus, "lancedb stores vectors").unwrap();
        service.ingest_file(&corpus).await.unwrap();

        let answer = in_flight.ask("is rust a language").await.unwrap();
        assert_eq!(answer.answer, "still here");
        assert_eq!(answer.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_ingest_keeps_active_chain() {
        let dir = TempDir::new().unwrap();
        let corpus = dir.path().join("notes.txt");
        std::fs::write(&corpus, "ollama runs models").unwrap();

        let service = service(dir.path(), "ok").await;
        let report = service.ingest_file(&corpus).await.unwrap();

        let err = service
            .ingest_file(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Ingest(IngestError::Load { .. })));

        let status = service.status().await;
        assert_eq!(status.manifest.unwrap().table, report.table);
        assert!(service.ask("which model?").await.is_ok());
    }

    #[tokio::test]
    async fn test_load_existing_after_restart() {
        let dir = TempDir::new().unwrap();
        let corpus = dir.path().join("notes.txt");
        std::fs::write(&corpus, "rag answer chunk").unwrap();

        let report = {
            let service = service(dir.path(), "ok").await;
            service.ingest_file(&corpus).await.unwrap()
        };

        let restarted = service(dir.path(), "again").await;
        assert!(restarted.load_existing().await.unwrap());
        assert_eq!(
            restarted.status().await.manifest.unwrap().table,
            report.table
        );
        assert_eq!(restarted.ask("rag?").await.unwrap().answer, "again");
    }
}
