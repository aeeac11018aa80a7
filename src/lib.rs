//! campus-rag - 대학 웹페이지 변경 감지 크롤러 + RAG 질의응답
//!
//! 1. crawl: 페이지 목록을 가져와 SHA-256 기준선과 비교, 신규/변경 페이지 기록
//! 2. index: 저장된 .txt / .pdf 파일을 패시지로 나눠 컬렉션별 벡터 인덱스에 저장
//! 3. merge: 컬렉션 인덱스들을 하나의 통합 인덱스로 병합
//! 4. ask: 통합 인덱스에서 검색한 패시지로 Gemini에게 답변 요청

pub mod cli;
pub mod collector;
pub mod config;
pub mod crawler;
pub mod embedding;
pub mod extractor;
pub mod gemini;
pub mod indexer;
pub mod knowledge;
pub mod llm;
pub mod qa;
pub mod scraper;
pub mod table;

// Re-exports
pub use config::{
    get_data_dir, CollectionLayout, CrawlConfig, IndexConfig, MergeConfig, QaConfig,
};
pub use crawler::{
    run_crawl, ChangeAwareCrawler, CrawlDelta, CrawlReport, FetchFailure, PageEntry, PageRecord,
};
pub use embedding::{EmbeddingProvider, GeminiEmbedding, TaskType};
pub use gemini::{get_api_key, has_api_key, GeminiClient};
pub use indexer::{run_index, CorpusIndexer, IndexReport, IndexSink, Passage};
pub use knowledge::{
    default_chunker, run_merge, ChunkConfig, Chunker, KnowledgeIndex, LanceVectorStore,
    MergeReport, RecursiveSplitter, SearchResult, VectorEntry, VectorStore,
};
pub use llm::{GeminiChat, LanguageModel};
pub use qa::{Answer, QaService};
pub use scraper::{FetchError, FetchedPage, WebScraper};
pub use table::{open_baseline_store, BaselineStore, CsvBaselineStore};
