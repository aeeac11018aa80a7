//! 테스트용 인메모리 구현체

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{EmbeddingProvider, TaskType};

use super::vector::{SearchResult, VectorEntry, VectorStore};

/// 키워드 등장 여부로 벡터를 만드는 임베딩
pub(crate) struct KeywordEmbedding {
    pub calls: Mutex<Vec<(usize, TaskType)>>,
}

pub(crate) const VOCAB: [&str; 8] = [
    "admission", "deadline", "tuition", "housing", "library", "campus", "course", "exam",
];

impl KeywordEmbedding {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedding {
    async fn embed_batch(&self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().unwrap().push((texts.len(), task));
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        VOCAB.len()
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// 삽입 배치 크기를 기록하는 인메모리 벡터 저장소
#[derive(Default)]
pub(crate) struct MemoryVectorStore {
    pub entries: Mutex<Vec<VectorEntry>>,
    pub insert_sizes: Mutex<Vec<usize>>,
}

impl MemoryVectorStore {
    pub fn with_entries(entries: Vec<VectorEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            insert_sizes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        self.insert_sizes.lock().unwrap().push(entries.len());
        self.entries.lock().unwrap().extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let mut scored: Vec<SearchResult> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| SearchResult {
                source: e.source.clone(),
                chunk_index: e.chunk_index,
                text: e.text.clone(),
                similarity: cosine_similarity(query_embedding, &e.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn scan(&self) -> Result<Vec<VectorEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.lock().unwrap().len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}
