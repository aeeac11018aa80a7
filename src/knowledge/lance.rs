//! LanceDB Vector Store
//!
//! 컬렉션마다 별도의 `.lance` 디렉토리를 사용합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::{Path, PathBuf};
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
use lancedb::table::Table;

use super::vector::{SearchResult, VectorEntry, VectorStore};

/// 벡터 테이블 이름
const TABLE_NAME: &str = "passages";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소
pub struct LanceVectorStore {
    db: Connection,
    path: PathBuf,
    dimension: i32,
}

impl LanceVectorStore {
    /// 저장소 열기 (디렉토리가 없으면 생성)
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 임베딩 차원
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
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
            .with_context(|| format!("Failed to connect to LanceDB at {:?}", path))?;

        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
            dimension,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("source", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != self.dimension as usize)
        {
            anyhow::bail!(
                "Embedding dimension mismatch for {}#{}: expected {}, got {}",
                bad.source,
                bad.chunk_index,
                self.dimension,
                bad.embedding.len()
            );
        }

        let sources: Vec<&str> = entries.iter().map(|e| e.source.as_str()).collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings = FixedSizeListArray::try_new(
            field,
            self.dimension,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        RecordBatch::try_new(
            Arc::new(self.schema()),
            vec![
                Arc::new(StringArray::from(sources)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(texts)),
                Arc::new(embeddings),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;
        Ok(names.iter().any(|n| n == TABLE_NAME))
    }

    /// 테이블 열기 (없으면 None)
    async fn open_table(&self) -> Result<Option<Table>> {
        if !self.table_exists().await? {
            return Ok(None);
        }
        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")?;
        Ok(Some(table))
    }
}

/// RecordBatch에서 이름으로 컬럼 꺼내기
fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow::anyhow!("Missing or mistyped column: {}", name))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        match self.open_table().await? {
            Some(table) => {
                table
                    .add(batches)
                    .execute()
                    .await
                    .context("Failed to add vectors to table")?;
            }
            None => {
                self.db
                    .create_table(TABLE_NAME, batches)
                    .execute()
                    .await
                    .context("Failed to create table")?;
            }
        }

        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let Some(table) = self.open_table().await? else {
            return Ok(vec![]);
        };

        let stream = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;
        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut results = Vec::new();
        for batch in batches {
            let sources = column::<StringArray>(&batch, "source")?;
            let chunk_indices = column::<Int32Array>(&batch, "chunk_index")?;
            let texts = column::<StringArray>(&batch, "text")?;
            // _distance 컬럼은 LanceDB가 자동 추가
            let distances = column::<Float32Array>(&batch, "_distance")?;

            for i in 0..batch.num_rows() {
                results.push(SearchResult {
                    source: sources.value(i).to_string(),
                    chunk_index: chunk_indices.value(i),
                    text: texts.value(i).to_string(),
                    // L2 거리 -> (0, 1] 유사도
                    similarity: 1.0 / (1.0 + distances.value(i)),
                });
            }
        }

        Ok(results)
    }

    async fn scan(&self) -> Result<Vec<VectorEntry>> {
        let Some(table) = self.open_table().await? else {
            return Ok(vec![]);
        };

        let total = table.count_rows(None).await.context("Failed to count rows")?;
        if total == 0 {
            return Ok(vec![]);
        }

        let stream = table
            .query()
            .limit(total)
            .execute()
            .await
            .context("Failed to scan table")?;
        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut entries = Vec::with_capacity(total);
        for batch in batches {
            let sources = column::<StringArray>(&batch, "source")?;
            let chunk_indices = column::<Int32Array>(&batch, "chunk_index")?;
            let texts = column::<StringArray>(&batch, "text")?;
            let embeddings = column::<FixedSizeListArray>(&batch, "embedding")?;

            for i in 0..batch.num_rows() {
                let values = embeddings.value(i);
                let values = values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| anyhow::anyhow!("Embedding values are not f32"))?;

                entries.push(VectorEntry {
                    source: sources.value(i).to_string(),
                    chunk_index: chunk_indices.value(i),
                    text: texts.value(i).to_string(),
                    embedding: values.values().to_vec(),
                });
            }
        }

        Ok(entries)
    }

    async fn count(&self) -> Result<usize> {
        match self.open_table().await? {
            Some(table) => table.count_rows(None).await.context("Failed to count rows"),
            None => Ok(0),
        }
    }

    async fn clear(&self) -> Result<()> {
        if self.table_exists().await? {
            self.db
                .drop_table(TABLE_NAME)
                .await
                .context("Failed to drop table")?;
            tracing::info!("Cleared vector index at {:?}", self.path);
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
    use tempfile::TempDir;

    const DIM: usize = 8;

    fn entry(source: &str, chunk_index: i32, fill: f32) -> VectorEntry {
        VectorEntry {
            source: source.to_string(),
            chunk_index,
            text: format!("passage {} of {}", chunk_index, source),
            embedding: vec![fill; DIM],
        }
    }

    #[tokio::test]
    async fn test_insert_count_scan() {
        let dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&dir.path().join("a.lance"), DIM)
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.scan().await.unwrap().is_empty());

        let entries = vec![entry("Home.txt", 0, 0.1), entry("Home.txt", 1, 0.2)];
        assert_eq!(store.insert_batch(&entries).await.unwrap(), 2);
        assert_eq!(store.insert_batch(&[entry("Apply.txt", 0, 0.3)]).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 3);

        let mut scanned = store.scan().await.unwrap();
        scanned.sort_by(|a, b| (&a.source, a.chunk_index).cmp(&(&b.source, b.chunk_index)));
        assert_eq!(scanned[0], entry("Apply.txt", 0, 0.3));
        assert_eq!(scanned[2], entry("Home.txt", 1, 0.2));
    }

    #[tokio::test]
    async fn test_search_returns_nearest() {
        let dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&dir.path().join("s.lance"), DIM)
            .await
            .unwrap();

        store
            .insert_batch(&[entry("a", 0, 0.0), entry("b", 0, 1.0), entry("c", 0, 5.0)])
            .await
            .unwrap();

        let results = store.search(&vec![0.9; DIM], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "b");
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&dir.path().join("d.lance"), DIM)
            .await
            .unwrap();

        let mut bad = entry("x", 0, 0.1);
        bad.embedding.pop();
        assert!(store.insert_batch(&[bad]).await.is_err());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&dir.path().join("c.lance"), DIM)
            .await
            .unwrap();

        store.insert_batch(&[entry("a", 0, 0.1)]).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        // 비어 있어도 다시 쓸 수 있음
        store.insert_batch(&[entry("a", 0, 0.1)]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
