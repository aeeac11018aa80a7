//! Vector Store - 벡터 저장소 트레이트

use anyhow::Result;
use async_trait::async_trait;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    /// 원본 파일 경로
    pub source: String,
    /// 파일 내 패시지 순번 (0-based)
    pub chunk_index: i32,
    /// 패시지 텍스트
    pub text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub source: String,
    pub chunk_index: i32,
    pub text: String,
    /// 유사도 스코어 (0.0 ~ 1.0, 높을수록 가까움)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// 벡터 저장소 공통 인터페이스
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 최근접 검색
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 저장된 모든 엔트리 읽기 (임베딩 포함)
    async fn scan(&self) -> Result<Vec<VectorEntry>>;

    /// 벡터 개수
    async fn count(&self) -> Result<usize>;

    /// 모든 벡터 삭제
    async fn clear(&self) -> Result<()>;
}
