//! LanceDB 벡터 인덱스
//!
//! 인제스트 한 번이 테이블 하나(= 세대, `chunks_<uuid>`)를 만들고,
//! `index.json` 매니페스트가 현재 세대를 가리킵니다.
//! 새 세대는 매니페스트 교체로만 활성화되므로,
//! 기존 [`VectorIndex`]를 들고 있는 리더는 교체 중에도 계속 검색할 수 있습니다.
//!
//! ref: https://lancedb.github.io/lancedb/

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;
use serde::{Deserialize, Serialize};

use super::chunker::Chunk;

/// 세대 테이블 접두사
const TABLE_PREFIX: &str = "chunks_";
/// 매니페스트 파일 이름
const MANIFEST_FILE: &str = "index.json";
/// LanceDB 데이터 하위 디렉토리
const LANCE_DIR: &str = "lance";

// ============================================================================
// Types
// ============================================================================

/// 활성 인덱스 매니페스트 (`index.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// 활성 세대 테이블 이름
    pub table: String,
    /// 청크 임베딩에 사용한 모델
    pub embedding_model: String,
    /// 벡터 차원
    pub dimension: usize,
    /// 저장된 청크 수
    pub chunk_count: usize,
    /// 인덱싱된 소스 목록 (중복 제거, 입력 순서)
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// 검색 결과 청크
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub text: String,
    pub source: String,
    pub title: Option<String>,
    pub chunk_index: usize,
    /// 유클리드(L2) 거리 (작을수록 가까움)
    pub distance: f32,
    /// 유사도 스코어 `1 / (1 + distance)` (0.0 ~ 1.0)
    pub score: f32,
}

// ============================================================================
// IndexStore
// ============================================================================

/// 인덱스 저장소 (디렉토리 단위)
pub struct IndexStore {
    dir: PathBuf,
    db: Connection,
}

impl IndexStore {
    /// 저장소 열기 (없으면 디렉토리 생성)
    pub async fn open(dir: &Path) -> Result<Self> {
        let lance_path = dir.join(LANCE_DIR);
        tokio::fs::create_dir_all(&lance_path)
            .await
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

        let path_str = lance_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            dir: dir.to_path_buf(),
            db,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// 새 세대 인덱스 생성
    ///
    /// 테이블을 먼저 완성한 뒤 매니페스트를 교체합니다.
    /// 이전 세대 테이블은 [`IndexStore::prune`] 전까지 남아있습니다.
    pub async fn build(
        &self,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
        embedding_model: &str,
    ) -> Result<VectorIndex> {
        if chunks.is_empty() {
            bail!("Cannot build an index from zero chunks");
        }
        if chunks.len() != vectors.len() {
            bail!(
                "Chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let dimension = vectors[0].len();
        if dimension == 0 {
            bail!("Embedding vectors must not be empty");
        }
        if vectors.iter().any(|v| v.len() != dimension) {
            bail!("All embedding vectors must have dimension {}", dimension);
        }

        let table_name = format!("{}{}", TABLE_PREFIX, uuid::Uuid::new_v4().simple());
        let batch = chunks_to_batch(chunks, &vectors, dimension)?;
        let schema = batch.schema();

        let table = self
            .db
            .create_table(&table_name, RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .with_context(|| format!("Failed to create table {}", table_name))?;

        let mut sources: Vec<String> = Vec::new();
        for chunk in chunks {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }

        let manifest = IndexManifest {
            table: table_name,
            embedding_model: embedding_model.to_string(),
            dimension,
            chunk_count: chunks.len(),
            sources,
            created_at: Utc::now(),
        };
        self.write_manifest(&manifest).await?;

        tracing::info!(
            "Built index {} ({} chunks, dimension {})",
            manifest.table,
            manifest.chunk_count,
            manifest.dimension
        );

        Ok(VectorIndex {
            table: Arc::new(table),
            manifest: Arc::new(manifest),
        })
    }

    /// 활성 인덱스 로드 (아직 없으면 None)
    pub async fn load(&self) -> Result<Option<VectorIndex>> {
        let Some(manifest) = self.manifest().await? else {
            return Ok(None);
        };

        let table = self
            .db
            .open_table(&manifest.table)
            .execute()
            .await
            .with_context(|| format!("Failed to open index table {}", manifest.table))?;

        tracing::info!(
            "Loaded index {} ({} chunks, model {})",
            manifest.table,
            manifest.chunk_count,
            manifest.embedding_model
        );

        Ok(Some(VectorIndex {
            table: Arc::new(table),
            manifest: Arc::new(manifest),
        }))
    }

    /// `keep`에 없는 모든 세대 테이블 삭제
    ///
    /// 삭제한 테이블 수를 반환합니다.
    /// 삭제된 테이블을 가리키는 [`VectorIndex`] 핸들은 더 이상 검색할 수 없습니다.
    pub async fn prune(&self, keep: &[&str]) -> Result<usize> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;

        let mut dropped = 0;
        for name in names
            .iter()
            .filter(|n| n.starts_with(TABLE_PREFIX) && !keep.contains(&n.as_str()))
        {
            self.db
                .drop_table(name)
                .await
                .with_context(|| format!("Failed to drop table {}", name))?;
            tracing::debug!("Dropped stale index table {}", name);
            dropped += 1;
        }

        Ok(dropped)
    }

    /// 세대 테이블 이름 목록
    pub async fn generations(&self) -> Result<Vec<String>> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        Ok(names
            .into_iter()
            .filter(|n| n.starts_with(TABLE_PREFIX))
            .collect())
    }

    /// 현재 매니페스트 (아직 없으면 None)
    pub async fn manifest(&self) -> Result<Option<IndexManifest>> {
        let path = self.manifest_path();
        let exists = tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check {}", path.display()))?;
        if !exists {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let manifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(manifest))
    }

    /// 임시 파일에 쓴 뒤 rename으로 교체
    async fn write_manifest(&self, manifest: &IndexManifest) -> Result<()> {
        let path = self.manifest_path();
        let tmp = self.dir.join(format!("{}.tmp", MANIFEST_FILE));

        let json = serde_json::to_string_pretty(manifest).context("Failed to encode manifest")?;
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

// ============================================================================
// VectorIndex
// ============================================================================

/// 한 세대의 읽기 전용 인덱스 핸들
#[derive(Clone)]
pub struct VectorIndex {
    table: Arc<Table>,
    manifest: Arc<IndexManifest>,
}

impl VectorIndex {
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// 최근접 청크 k개 검색 (거리 오름차순)
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(vec![]);
        }
        if query.len() != self.manifest.dimension {
            bail!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.manifest.dimension
            );
        }

        let stream = self
            .table
            .vector_search(query.to_vec())
            .context("Failed to create vector search")?
            .limit(k)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut results = Vec::with_capacity(k);
        for batch in &batches {
            results.extend(batch_to_results(batch)?);
        }

        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    /// 저장된 청크 수
    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .context("Failed to count rows")
    }
}

// ============================================================================
// Arrow Conversion
// ============================================================================

fn create_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, true),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ])
}

fn chunks_to_batch(chunks: &[Chunk], vectors: &[Vec<f32>], dimension: usize) -> Result<RecordBatch> {
    let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

    let chunk_indices = chunks
        .iter()
        .map(|c| i32::try_from(c.chunk_index).context("chunk_index overflow"))
        .collect::<Result<Vec<i32>>>()?;
    let sources: Vec<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
    let titles: Vec<Option<&str>> = chunks.iter().map(|c| c.title.as_deref()).collect();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

    let flat: Vec<f32> = vectors.iter().flat_map(|v| v.iter().copied()).collect();
    let vector_list = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        dimension,
        Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
        None,
    )
    .context("Failed to create vector array")?;

    RecordBatch::try_new(
        Arc::new(create_schema(dimension)),
        vec![
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(texts)),
            Arc::new(vector_list),
        ],
    )
    .context("Failed to create RecordBatch")
}

fn batch_to_results(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
    let column = |name: &str| {
        batch
            .column_by_name(name)
            .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
    };

    let chunk_indices = column("chunk_index")?
        .as_any()
        .downcast_ref::<Int32Array>()
        .ok_or_else(|| anyhow::anyhow!("chunk_index column has unexpected type"))?;
    let sources = column("source")?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow::anyhow!("source column has unexpected type"))?;
    let titles = column("title")?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow::anyhow!("title column has unexpected type"))?;
    let texts = column("text")?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow::anyhow!("text column has unexpected type"))?;
    // LanceDB가 자동 추가
    let distances = column("_distance")?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| anyhow::anyhow!("_distance column has unexpected type"))?;

    Ok((0..batch.num_rows())
        .map(|i| {
            // `_distance`는 L2 제곱값
            let distance = distances.value(i).max(0.0).sqrt();
            ScoredChunk {
                text: texts.value(i).to_string(),
                source: sources.value(i).to_string(),
                title: (!titles.is_null(i)).then(|| titles.value(i).to_string()),
                chunk_index: chunk_indices.value(i).max(0) as usize,
                distance,
                score: 1.0 / (1.0 + distance),
            }
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
