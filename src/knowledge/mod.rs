//! Knowledge 모듈 - 패시지 분할 + 벡터 인덱스
//!
//! - Chunker: 재귀 문자 분할 (최대 길이 + 오버랩)
//! - LanceDB: 컬렉션별 벡터 저장소
//! - KnowledgeIndex: 임베딩 + 저장소, 인덱서의 싱크
//! - Merge: 컬렉션 인덱스들을 통합 인덱스로 복사

mod chunker;
mod index;
mod lance;
mod merge;
mod vector;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use chunker::{default_chunker, ChunkConfig, Chunker, RecursiveSplitter};
pub use index::{IndexStats, KnowledgeIndex};
pub use lance::LanceVectorStore;
pub use merge::{merge_stores, run_merge, MergeReport};
pub use vector::{SearchResult, VectorEntry, VectorStore};
