//! 설정 모듈
//!
//! 파이프라인의 모든 경로와 상수를 명시적인 설정 구조체로 모읍니다.
//! 각 단계(크롤링, 인덱싱, 질의응답)는 자기 설정만 받아서 동작합니다.
//!
//! 컬렉션 단위 디렉토리 구조:
//! ```text
//! <data_dir>/
//!   pages/<collection>.csv          # 입력 테이블 (Page_Name, Link)
//!   static/<collection>/            # 페이지별 .txt 파일
//!   baseline/<collection>.csv       # 해시 기준선 (Page_Name, Link, Hash_Code)
//!   updated/<collection>.csv        # 변경 목록 (Old_Hash_Code, New_Hash_Code)
//!   vectordb/<collection>.lance     # 컬렉션별 벡터 인덱스
//!   vectordb/unified.lance          # 통합 인덱스
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::embedding::DEFAULT_DIMENSION;
use crate::knowledge::ChunkConfig;

/// 데이터 디렉토리 환경변수
pub const DATA_DIR_ENV: &str = "CAMPUS_RAG_DATA_DIR";

/// HTTP 요청 기본 타임아웃
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// 인덱스 삽입 기본 배치 크기
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// 벡터 백엔드가 한 번에 받을 수 있는 최대 배치 크기
pub const MAX_BACKEND_BATCH_SIZE: usize = 5461;

/// 질의응답 시 검색할 패시지 수
pub const DEFAULT_TOP_K: usize = 5;

/// 통합 인덱스 이름
pub const UNIFIED_COLLECTION: &str = "unified";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로
///
/// 우선순위: `CAMPUS_RAG_DATA_DIR` > `<local data dir>/.campus-rag`
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".campus-rag")
}

/// 컬렉션 디렉토리 레이아웃
#[derive(Debug, Clone)]
pub struct CollectionLayout {
    data_dir: PathBuf,
    name: String,
}

impl CollectionLayout {
    pub fn new(data_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn pages_table(&self) -> PathBuf {
        self.data_dir.join("pages").join(format!("{}.csv", self.name))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("static").join(&self.name)
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.data_dir.join("baseline").join(format!("{}.csv", self.name))
    }

    pub fn delta_path(&self) -> PathBuf {
        self.data_dir.join("updated").join(format!("{}.csv", self.name))
    }

    pub fn vector_dir(&self) -> PathBuf {
        vector_dir(&self.data_dir, &self.name)
    }
}

/// 컬렉션 이름에 대응하는 벡터 인덱스 디렉토리
pub fn vector_dir(data_dir: &Path, collection: &str) -> PathBuf {
    data_dir.join("vectordb").join(format!("{}.lance", collection))
}

// ============================================================================
// Crawl
// ============================================================================

/// 크롤러 설정
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// 입력 테이블 (Page_Name, Link)
    pub pages_table: PathBuf,
    /// 페이지 파일 저장 디렉토리
    pub output_dir: PathBuf,
    /// 기준선 저장 위치 (.csv 또는 .db/.sqlite)
    pub baseline_path: PathBuf,
    /// 변경 목록 저장 위치
    pub delta_path: PathBuf,
    /// 페이지당 요청 타임아웃
    pub timeout: Duration,
    pub user_agent: String,
}

impl CrawlConfig {
    pub fn for_collection(layout: &CollectionLayout) -> Self {
        Self {
            pages_table: layout.pages_table(),
            output_dir: layout.output_dir(),
            baseline_path: layout.baseline_path(),
            delta_path: layout.delta_path(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: default_user_agent(),
        }
    }
}

// ============================================================================
// Index
// ============================================================================

/// 인덱서 설정
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// 순회할 루트 디렉토리
    pub source_dir: PathBuf,
    /// 벡터 인덱스 디렉토리
    pub vector_dir: PathBuf,
    pub chunk: ChunkConfig,
    /// 싱크 호출당 패시지 수
    pub batch_size: usize,
    /// .txt 파일의 HTML을 본문 텍스트로 변환할지 여부
    pub strip_html: bool,
    /// 기존 인덱스를 비우지 않고 이어서 추가
    pub append: bool,
}

impl IndexConfig {
    pub fn for_collection(layout: &CollectionLayout) -> Self {
        Self {
            source_dir: layout.output_dir(),
            vector_dir: layout.vector_dir(),
            chunk: ChunkConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            strip_html: false,
            append: false,
        }
    }

    /// 백엔드 한도로 잘린 실제 배치 크기 (최소 1)
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BACKEND_BATCH_SIZE)
    }
}

// ============================================================================
// Merge
// ============================================================================

/// 인덱스 병합 설정
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// (컬렉션 이름, 벡터 인덱스 디렉토리)
    pub sources: Vec<(String, PathBuf)>,
    /// 통합 인덱스 디렉토리
    pub target_dir: PathBuf,
    pub batch_size: usize,
    pub dimension: usize,
    /// 통합 인덱스를 비우지 않고 이어서 추가
    pub append: bool,
}

impl MergeConfig {
    pub fn unified(data_dir: &Path, collections: &[String]) -> Self {
        Self {
            sources: collections
                .iter()
                .map(|c| (c.clone(), vector_dir(data_dir, c)))
                .collect(),
            target_dir: vector_dir(data_dir, UNIFIED_COLLECTION),
            batch_size: MAX_BACKEND_BATCH_SIZE,
            dimension: DEFAULT_DIMENSION,
            append: false,
        }
    }
}

// ============================================================================
// Question Answering
// ============================================================================

/// 질의응답 설정
#[derive(Debug, Clone)]
pub struct QaConfig {
    /// 검색 대상 (통합) 인덱스 디렉토리
    pub vector_dir: PathBuf,
    pub top_k: usize,
}

impl QaConfig {
    pub fn unified(data_dir: &Path) -> Self {
        Self {
            vector_dir: vector_dir(data_dir, UNIFIED_COLLECTION),
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_user_agent() -> String {
    format!("campus-rag/{}", env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_layout_paths() {
        let layout = CollectionLayout::new("/data", "academics");
        assert_eq!(layout.pages_table(), PathBuf::from("/data/pages/academics.csv"));
        assert_eq!(layout.output_dir(), PathBuf::from("/data/static/academics"));
        assert_eq!(layout.baseline_path(), PathBuf::from("/data/baseline/academics.csv"));
        assert_eq!(layout.delta_path(), PathBuf::from("/data/updated/academics.csv"));
        assert_eq!(layout.vector_dir(), PathBuf::from("/data/vectordb/academics.lance"));
    }

    #[test]
    fn test_collections_do_not_share_directories() {
        let a = CollectionLayout::new("/data", "academics");
        let b = CollectionLayout::new("/data", "admission");
        assert_ne!(a.output_dir(), b.output_dir());
        assert_ne!(a.vector_dir(), b.vector_dir());
        assert_ne!(a.vector_dir(), vector_dir(Path::new("/data"), UNIFIED_COLLECTION));
    }

    #[test]
    fn test_crawl_config_defaults() {
        let config = CrawlConfig::for_collection(&CollectionLayout::new("/data", "admission"));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("campus-rag/"));
    }

    #[test]
    fn test_effective_batch_size() {
        let mut config = IndexConfig::for_collection(&CollectionLayout::new("/data", "x"));
        assert_eq!(config.effective_batch_size(), 500);

        config.batch_size = 0;
        assert_eq!(config.effective_batch_size(), 1);

        config.batch_size = 100_000;
        assert_eq!(config.effective_batch_size(), MAX_BACKEND_BATCH_SIZE);
    }

    #[test]
    fn test_merge_config_unified() {
        let config = MergeConfig::unified(
            Path::new("/data"),
            &["academics".to_string(), "admission".to_string()],
        );
        assert_eq!(config.sources.len(), 2);
        assert_eq!(
            config.sources[1],
            ("admission".to_string(), PathBuf::from("/data/vectordb/admission.lance"))
        );
        assert_eq!(config.target_dir, PathBuf::from("/data/vectordb/unified.lance"));
        assert_eq!(config.batch_size, 5461);
        assert!(!config.append);
    }
}
