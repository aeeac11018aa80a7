//! 지식 인덱스 - 임베딩 + 벡터 저장소
//!
//! 인덱서가 넘긴 패시지를 문서 임베딩으로 변환해 저장하고,
//! 질의를 질의 임베딩으로 변환해 최근접 패시지를 찾습니다.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::embedding::{EmbeddingProvider, TaskType};
use crate::indexer::{IndexSink, Passage};

use super::lance::LanceVectorStore;
use super::vector::{SearchResult, VectorEntry, VectorStore};

/// 인덱스 통계
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub vector_count: usize,
    pub embedder: String,
    pub dimension: usize,
}

/// 컬렉션 하나의 벡터 인덱스
pub struct KnowledgeIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl KnowledgeIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// LanceDB 디렉토리로 열기 (차원은 임베딩 프로바이더를 따름)
    pub async fn open(vector_dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let store = LanceVectorStore::open(vector_dir, embedder.dimension())
            .await
            .context("Failed to open vector store")?;
        Ok(Self::new(embedder, Arc::new(store)))
    }

    /// 질의와 가까운 패시지 검색
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query_embedding = self
            .embedder
            .embed(query, TaskType::RetrievalQuery)
            .await
            .context("Failed to embed query")?;
        self.store.search(&query_embedding, limit).await
    }

    /// 저장된 벡터 전체 삭제
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            vector_count: self.store.count().await?,
            embedder: self.embedder.name().to_string(),
            dimension: self.embedder.dimension(),
        })
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }
}

#[async_trait]
impl IndexSink for KnowledgeIndex {
    async fn add_passages(&self, passages: &[Passage]) -> Result<usize> {
        if passages.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts, TaskType::RetrievalDocument)
            .await
            .context("Failed to embed passages")?;

        let entries = passages
            .iter()
            .zip(embeddings)
            .map(|(passage, embedding)| {
                Ok(VectorEntry {
                    source: passage.source.clone(),
                    chunk_index: i32::try_from(passage.index)
                        .context("Passage index out of range")?,
                    text: passage.text.clone(),
                    embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let inserted = self
            .store
            .insert_batch(&entries)
            .await
            .context("Failed to insert vectors")?;

        tracing::debug!("Stored {} passages", inserted);
        Ok(inserted)
    }
}

// ============================================================================
// Tests
// ============================================================================
