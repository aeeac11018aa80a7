//! 테이블 모듈 - 입력 페이지 목록, 기준선, 변경 목록
//!
//! 기준선은 [`BaselineStore`] 뒤에 숨깁니다. 저장 형식과 무관하게
//! `load_all` / `replace_all` 두 연산만 제공하므로 비교 로직은
//! 저장 형식 없이 테스트할 수 있습니다.
//!
//! - `.csv` 경로: [`CsvBaselineStore`]
//! - `.db` / `.sqlite` 경로: [`SqliteBaselineStore`]

mod sqlite;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::crawler::{CrawlDelta, PageEntry, PageRecord};

pub use sqlite::SqliteBaselineStore;

/// 기준선 테이블 컬럼
pub const BASELINE_HEADER: [&str; 3] = ["Page_Name", "Link", "Hash_Code"];

/// 변경 목록 테이블 컬럼
pub const DELTA_HEADER: [&str; 4] = ["Page_Name", "Link", "Old_Hash_Code", "New_Hash_Code"];

// ============================================================================
// BaselineStore
// ============================================================================

/// 이전 실행의 (이름 -> 해시) 기록 저장소
pub trait BaselineStore {
    /// 저장된 레코드 전체 로드 (저장소가 없으면 빈 목록)
    fn load_all(&self) -> Result<Vec<PageRecord>>;

    /// 저장된 레코드 전체를 교체
    fn replace_all(&self, records: &[PageRecord]) -> Result<()>;
}

/// 경로 확장자에 맞는 기준선 저장소 열기
pub fn open_baseline_store(path: &Path) -> Result<Box<dyn BaselineStore>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "db" | "sqlite" | "sqlite3" => Ok(Box::new(SqliteBaselineStore::open(path)?)),
        _ => Ok(Box::new(CsvBaselineStore::new(path))),
    }
}

// ============================================================================
// CSV Baseline
// ============================================================================

/// CSV 파일 기준선 (Page_Name, Link, Hash_Code)
pub struct CsvBaselineStore {
    path: PathBuf,
}

impl CsvBaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BaselineStore for CsvBaselineStore {
    fn load_all(&self) -> Result<Vec<PageRecord>> {
        if !self.path.exists() {
            tracing::debug!("No baseline at {:?}, starting empty", self.path);
            return Ok(vec![]);
        }
        read_rows(&self.path)
    }

    fn replace_all(&self, records: &[PageRecord]) -> Result<()> {
        write_rows_atomic(&self.path, &BASELINE_HEADER, records)
    }
}

// ============================================================================
// Pages / Deltas
// ============================================================================

/// 입력 테이블 로드 (Page_Name, Link)
///
/// 이름이나 링크가 빈 행은 경고 후 건너뜁니다. 중복 이름은 그대로 둡니다.
pub fn load_pages(path: &Path) -> Result<Vec<PageEntry>> {
    let rows: Vec<PageEntry> =
        read_rows(path).with_context(|| format!("Failed to load pages table: {:?}", path))?;

    let total = rows.len();
    let pages: Vec<PageEntry> = rows
        .into_iter()
        .filter(|p| {
            let keep = !p.name.is_empty() && !p.url.is_empty();
            if !keep {
                tracing::warn!("Skipping incomplete row: name={:?} url={:?}", p.name, p.url);
            }
            keep
        })
        .collect();

    tracing::debug!("Loaded {}/{} page rows from {:?}", pages.len(), total, path);
    Ok(pages)
}

/// 변경 목록 저장 (Page_Name, Link, Old_Hash_Code, New_Hash_Code)
///
/// 변경이 없어도 헤더만 있는 파일을 씁니다.
pub fn write_deltas(path: &Path, deltas: &[CrawlDelta]) -> Result<()> {
    write_rows_atomic(path, &DELTA_HEADER, deltas)
}

/// 변경 목록 로드
pub fn load_deltas(path: &Path) -> Result<Vec<CrawlDelta>> {
    read_rows(path)
}

// ============================================================================
// CSV Helpers
// ============================================================================

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open table: {:?}", path))?;

    let mut rows = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        // 헤더가 1행이므로 데이터는 2행부터
        let row: T = row.with_context(|| format!("Invalid row {} in {:?}", i + 2, path))?;
        rows.push(row);
    }
    Ok(rows)
}

/// 헤더 포함 전체 테이블을 임시 파일에 쓴 뒤 rename
///
/// 행이 없어도 헤더는 항상 씁니다.
fn write_rows_atomic<T: serde::Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    {
        let file = File::create(&tmp_path)
            .with_context(|| format!("Failed to create table: {:?}", tmp_path))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer.write_record(header).context("Failed to write header")?;
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("Failed to write row to {:?}", tmp_path))?;
        }
        writer.flush().context("Failed to flush table")?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace table: {:?}", path))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, hash: &str) -> PageRecord {
        PageRecord {
            name: name.to_string(),
            url: format!("https://example.edu/{}", name.to_lowercase()),
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_load_pages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pages.csv");
        fs::write(
            &path,
            "Page_Name,Link\n\
             Home, https://example.edu/home\n\
             Tuition Costs,https://example.edu/tuition\n\
             ,https://example.edu/blank\n",
        )
        .unwrap();

        let pages = load_pages(&path).unwrap();
        assert_eq!(
            pages,
            vec![
                PageEntry::new("Home", "https://example.edu/home"),
                PageEntry::new("Tuition Costs", "https://example.edu/tuition"),
            ]
        );
    }

    #[test]
    fn test_load_pages_ignores_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pages.csv");
        fs::write(&path, "Link,Notes,Page_Name\nhttps://example.edu/a,x,A\n").unwrap();

        let pages = load_pages(&path).unwrap();
        assert_eq!(pages, vec![PageEntry::new("A", "https://example.edu/a")]);
    }

    #[test]
    fn test_load_pages_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load_pages(&dir.path().join("nope.csv")).is_err());
    }

    #[test]
    fn test_csv_baseline_roundtrip_and_replace() {
        let dir = TempDir::new().unwrap();
        let store = CsvBaselineStore::new(dir.path().join("baseline").join("a.csv"));

        assert!(store.load_all().unwrap().is_empty());

        store
            .replace_all(&[record("Home", "aa"), record("Apply", "bb")])
            .unwrap();
        assert_eq!(store.load_all().unwrap().len(), 2);

        store.replace_all(&[record("Home", "cc")]).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![record("Home", "cc")]);
    }

    #[test]
    fn test_csv_baseline_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("baseline.csv");
        CsvBaselineStore::new(&path)
            .replace_all(&[record("Home", "aa")])
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Page_Name,Link,Hash_Code\n"));
    }

    #[test]
    fn test_write_deltas_null_previous_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updated.csv");
        let deltas = vec![
            CrawlDelta {
                name: "Home".to_string(),
                url: "https://example.edu/home".to_string(),
                previous_hash: None,
                current_hash: "bb".to_string(),
            },
            CrawlDelta {
                name: "Apply".to_string(),
                url: "https://example.edu/apply".to_string(),
                previous_hash: Some("aa".to_string()),
                current_hash: "cc".to_string(),
            },
        ];
        write_deltas(&path, &deltas).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Page_Name,Link,Old_Hash_Code,New_Hash_Code\n"));
        assert!(text.contains("Home,https://example.edu/home,,bb"));

        assert_eq!(load_deltas(&path).unwrap(), deltas);
    }

    #[test]
    fn test_write_empty_deltas_keeps_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updated.csv");
        write_deltas(&path, &[]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), "Page_Name,Link,Old_Hash_Code,New_Hash_Code");
        assert!(load_deltas(&path).unwrap().is_empty());
    }

    #[test]
    fn test_open_baseline_store_by_extension() {
        let dir = TempDir::new().unwrap();

        let sqlite = open_baseline_store(&dir.path().join("baseline.db")).unwrap();
        sqlite.replace_all(&[record("Home", "aa")]).unwrap();
        assert_eq!(sqlite.load_all().unwrap(), vec![record("Home", "aa")]);

        let csv = open_baseline_store(&dir.path().join("baseline.csv")).unwrap();
        assert!(csv.load_all().unwrap().is_empty());
    }
}
