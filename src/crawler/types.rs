//! 크롤러 데이터 타입

use serde::{Deserialize, Serialize};

/// 입력 테이블의 한 행
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    #[serde(rename = "Page_Name")]
    pub name: String,
    #[serde(rename = "Link")]
    pub url: String,
}

impl PageEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// 기준선 레코드 (페이지 이름 -> 해시)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(rename = "Page_Name")]
    pub name: String,
    #[serde(rename = "Link")]
    pub url: String,
    /// SHA-256 hex (64자)
    #[serde(rename = "Hash_Code")]
    pub content_hash: String,
}

/// 신규 또는 변경된 페이지
///
/// 해시가 같은 페이지는 절대 델타로 만들어지지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlDelta {
    #[serde(rename = "Page_Name")]
    pub name: String,
    #[serde(rename = "Link")]
    pub url: String,
    /// 기준선에 없던 페이지면 None
    #[serde(rename = "Old_Hash_Code")]
    pub previous_hash: Option<String>,
    #[serde(rename = "New_Hash_Code")]
    pub current_hash: String,
}

impl CrawlDelta {
    pub fn is_new(&self) -> bool {
        self.previous_hash.is_none()
    }
}

/// 가져오기에 실패한 페이지
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub name: String,
    pub url: String,
    pub reason: String,
}

/// 한 번의 크롤링 결과
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// 새 기준선 (실패 페이지의 이전 레코드 포함)
    pub baseline: Vec<PageRecord>,
    pub deltas: Vec<CrawlDelta>,
    pub failures: Vec<FetchFailure>,
    /// 해시가 그대로인 페이지 수
    pub unchanged: usize,
    /// 저장된 파일 수 (중복 이름 포함)
    pub saved: usize,
    /// 같은 파일로 저장된 서로 다른 이름 (먼저 쓴 이름, 덮어쓴 이름)
    pub collisions: Vec<(String, String)>,
}

impl CrawlReport {
    pub fn new_pages(&self) -> usize {
        self.deltas.iter().filter(|d| d.is_new()).count()
    }

    pub fn updated_pages(&self) -> usize {
        self.deltas.iter().filter(|d| !d.is_new()).count()
    }
}
