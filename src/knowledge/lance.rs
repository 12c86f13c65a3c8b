//! LanceDB Vector Store - 디스크 영속 벡터 인덱스
//!
//! 임베딩된 청크를 디스크에 보관하여 재시작 시 PDF 파싱과 임베딩을 건너뜁니다.
//! 임베딩 차원은 모델마다 다르므로 첫 배치에서 결정합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::document::Document;
use super::vector::{SearchResult, VectorEntry, VectorStore};

/// 청크 테이블 이름
const TABLE_NAME: &str = "chunks";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db })
    }

    /// 청크 테이블 스키마 생성
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::Int32, true),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        let dimension = entries[0].embedding.len();
        if dimension == 0 || entries.iter().any(|e| e.embedding.len() != dimension) {
            anyhow::bail!("All embeddings in a batch must share a non-zero dimension");
        }
        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let sources: Vec<&str> = entries
            .iter()
            .map(|e| e.document.metadata.source.as_str())
            .collect();
        let pages: Vec<Option<i32>> = entries
            .iter()
            .map(|e| e.document.metadata.page.and_then(|p| i32::try_from(p).ok()))
            .collect();
        let chunk_texts: Vec<&str> = entries
            .iter()
            .map(|e| e.document.page_content.as_str())
            .collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema(dimension)),
            vec![
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(sources)),
                Arc::new(Int32Array::from(pages)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// RecordBatch에서 검색 결과 추출
    fn batch_to_results(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let chunk_indices = batch
            .column_by_name("chunk_index")
            .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

        let sources = batch
            .column_by_name("source")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| anyhow::anyhow!("Missing source column"))?;

        let pages = batch
            .column_by_name("page")
            .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing page column"))?;

        let chunk_texts = batch
            .column_by_name("chunk_text")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| anyhow::anyhow!("Missing chunk_text column"))?;

        // _distance 컬럼 (LanceDB가 자동 추가, L2 제곱 거리)
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

        let results = (0..batch.num_rows())
            .map(|i| {
                let page = if pages.is_null(i) {
                    None
                } else {
                    usize::try_from(pages.value(i)).ok()
                };
                let document = Document::new(chunk_texts.value(i), sources.value(i), page);
                let distance = distances.value(i).max(0.0).sqrt();
                SearchResult::new(chunk_indices.value(i), document, distance)
            })
            .collect();

        Ok(results)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.iter().any(|n| n == TABLE_NAME))
            .unwrap_or(false)
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open chunk table")
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = Self::entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            self.open_table()
                .await?
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 || !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let stream = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(Self::batch_to_results(batch)?);
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .context("Failed to count rows")?;
        Ok(count)
    }

    async fn clear(&self) -> Result<()> {
        if self.table_exists().await {
            self.db
                .drop_table(TABLE_NAME)
                .await
                .context("Failed to drop chunk table")?;
            tracing::info!("Dropped LanceDB table '{}'", TABLE_NAME);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "lancedb"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 8;

    fn create_test_entry(chunk_index: i32, value: f32) -> VectorEntry {
        VectorEntry {
            chunk_index,
            document: Document::new(
                format!("Test chunk {}", chunk_index),
                "gale.pdf",
                Some(chunk_index as usize + 1),
            ),
            embedding: vec![value; DIM],
        }
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("test.lance"))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);

        let entries = vec![create_test_entry(0, 0.1), create_test_entry(1, 0.2)];
        assert_eq!(store.insert_batch(&entries).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);

        // 두 번째 배치는 기존 테이블에 추가
        store.insert_batch(&[create_test_entry(2, 0.3)]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_lance_search_roundtrips_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("search.lance"))
            .await
            .unwrap();

        let entries = vec![
            create_test_entry(0, 0.1),
            create_test_entry(1, 0.5),
            create_test_entry(2, 0.9),
        ];
        store.insert_batch(&entries).await.unwrap();

        let results = store.search(&vec![0.5; DIM], 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 1);
        assert_eq!(results[0].document.page_content, "Test chunk 1");
        assert_eq!(results[0].document.metadata.source, "gale.pdf");
        assert_eq!(results[0].document.metadata.page, Some(2));
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn test_lance_clear_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clear.lance");

        {
            let store = LanceVectorStore::open(&path).await.unwrap();
            store.insert_batch(&[create_test_entry(0, 0.1)]).await.unwrap();
        }

        // 재오픈 시 데이터 유지
        let store = LanceVectorStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&vec![0.1; DIM], 4).await.unwrap().is_empty());
    }

    #[test]
    fn test_entries_to_batch_rejects_mixed_dimensions() {
        let mut bad = create_test_entry(1, 0.2);
        bad.embedding.pop();
        assert!(LanceVectorStore::entries_to_batch(&[create_test_entry(0, 0.1), bad]).is_err());
        assert!(LanceVectorStore::entries_to_batch(&[]).is_err());
    }
}
