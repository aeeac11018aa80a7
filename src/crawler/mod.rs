//! 변경 감지 크롤러
//!
//! 입력 테이블의 (이름, URL) 목록을 순서대로 가져와서:
//! 1. 본문을 `<output_dir>/<이름>.txt`에 저장 (변경 여부와 무관하게 덮어씀)
//! 2. 저장한 바이트의 SHA-256 지문 계산
//! 3. 이전 기준선과 비교하여 신규/변경 페이지를 [`CrawlDelta`]로 기록
//!
//! 가져오기 실패(타임아웃, 2xx 외 상태, 디코딩 오류)는 soft failure입니다.
//! 파일을 쓰지 않고, 델타도 만들지 않으며, 이전 기준선 레코드를 그대로 둡니다.
//! 재시도는 없습니다.

mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::config::CrawlConfig;
use crate::scraper::WebScraper;
use crate::table::{self, BaselineStore};

pub use types::{CrawlDelta, CrawlReport, FetchFailure, PageEntry, PageRecord};

// ============================================================================
// Fingerprint
// ============================================================================

/// 콘텐츠 지문 (SHA-256, 소문자 hex 64자)
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// 페이지 이름 -> 파일 이름
///
/// 공백 문자와 경로 구분자는 `_`로 바꿉니다.
pub fn page_file_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("{}.txt", sanitized)
}

/// 기준선과 비교하여 델타 결정
///
/// 해시가 같으면 `None`.
pub fn detect_change(
    entry: &PageEntry,
    previous: Option<&PageRecord>,
    current_hash: &str,
) -> Option<CrawlDelta> {
    match previous {
        Some(prev) if prev.content_hash == current_hash => None,
        _ => Some(CrawlDelta {
            name: entry.name.clone(),
            url: entry.url.clone(),
            previous_hash: previous.map(|p| p.content_hash.clone()),
            current_hash: current_hash.to_string(),
        }),
    }
}

// ============================================================================
// ChangeAwareCrawler
// ============================================================================

/// 변경 감지 크롤러
pub struct ChangeAwareCrawler {
    scraper: WebScraper,
    output_dir: PathBuf,
}

impl ChangeAwareCrawler {
    /// 설정으로 생성
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let scraper = WebScraper::new(config.timeout, &config.user_agent)?;
        Ok(Self::with_scraper(scraper, &config.output_dir))
    }

    pub fn with_scraper(scraper: WebScraper, output_dir: &Path) -> Self {
        Self {
            scraper,
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// 페이지 목록 크롤링
    ///
    /// 파일 쓰기 오류는 전체 실행을 중단시킵니다.
    /// 반환된 리포트의 `baseline`이 다음 실행의 기준선입니다.
    pub async fn crawl(&self, pages: &[PageEntry], prior: &[PageRecord]) -> Result<CrawlReport> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create output directory: {:?}", self.output_dir))?;

        // 같은 이름이 여러 번 있으면 첫 레코드 사용
        let mut previous: HashMap<&str, &PageRecord> = HashMap::new();
        for record in prior {
            previous.entry(record.name.as_str()).or_insert(record);
        }

        let mut written: HashMap<String, String> = HashMap::new();
        let mut baseline = BaselineBuilder::default();
        let mut report = CrawlReport::default();

        for (i, entry) in pages.iter().enumerate() {
            tracing::debug!("[{}/{}] {}", i + 1, pages.len(), entry.name);

            let page = match self.scraper.fetch(&entry.url).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("Failed to fetch {} ({}): {}", entry.name, entry.url, e);
                    if let Some(prev) = previous.get(entry.name.as_str()) {
                        baseline.keep(prev);
                    }
                    report.failures.push(FetchFailure {
                        name: entry.name.clone(),
                        url: entry.url.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let bytes = page.body.as_bytes();
            let file_name = page_file_name(&entry.name);
            if let Some(owner) = written.get(&file_name) {
                if owner != &entry.name {
                    tracing::warn!(
                        "{} and {} both map to {}, overwriting",
                        owner,
                        entry.name,
                        file_name
                    );
                    report.collisions.push((owner.clone(), entry.name.clone()));
                }
            }
            let file_path = self.output_dir.join(&file_name);
            tokio::fs::write(&file_path, bytes)
                .await
                .with_context(|| format!("Failed to write page file: {:?}", file_path))?;
            report.saved += 1;
            written.insert(file_name, entry.name.clone());

            let hash = fingerprint(bytes);
            tracing::info!("Scraped and saved: {} -> {:?}", entry.name, file_path);

            let prev = previous.get(entry.name.as_str()).copied();
            match detect_change(entry, prev, &hash) {
                Some(delta) => {
                    if delta.is_new() {
                        tracing::info!("New page: {}", entry.name);
                    } else {
                        tracing::info!("Page updated: {}", entry.name);
                    }
                    report.deltas.push(delta);
                }
                None => report.unchanged += 1,
            }

            baseline.upsert(PageRecord {
                name: entry.name.clone(),
                url: entry.url.clone(),
                content_hash: hash,
            });
        }

        report.baseline = baseline.finish();

        tracing::info!(
            "Crawl finished: {} new, {} updated, {} unchanged, {} failed",
            report.new_pages(),
            report.updated_pages(),
            report.unchanged,
            report.failures.len()
        );

        Ok(report)
    }
}

/// 이름 기준 last-write-wins 기준선 누적기 (입력 순서 유지)
#[derive(Default)]
struct BaselineBuilder {
    records: Vec<PageRecord>,
    index: HashMap<String, usize>,
}

impl BaselineBuilder {
    fn upsert(&mut self, record: PageRecord) {
        match self.index.get(&record.name) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.index.insert(record.name.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// 실패한 페이지의 이전 레코드 유지 (이번 실행에서 이미 갱신됐다면 무시)
    fn keep(&mut self, previous: &PageRecord) {
        if !self.index.contains_key(&previous.name) {
            self.upsert(previous.clone());
        }
    }

    fn finish(self) -> Vec<PageRecord> {
        self.records
    }
}

// ============================================================================
// Run
// ============================================================================

/// 크롤링 1회 실행: 입력 로드 -> 크롤링 -> 기준선/델타 저장
pub async fn run_crawl(config: &CrawlConfig) -> Result<CrawlReport> {
    let pages = table::load_pages(&config.pages_table)?;
    let store = table::open_baseline_store(&config.baseline_path)?;
    let crawler = ChangeAwareCrawler::new(config)?;

    run_crawl_with(&crawler, &pages, store.as_ref(), &config.delta_path).await
}

/// 주입된 크롤러와 기준선 저장소로 실행
pub async fn run_crawl_with(
    crawler: &ChangeAwareCrawler,
    pages: &[PageEntry],
    store: &dyn BaselineStore,
    delta_path: &Path,
) -> Result<CrawlReport> {
    let prior = store.load_all().context("Failed to load baseline")?;
    tracing::info!(
        "Crawling {} pages against {} baseline records",
        pages.len(),
        prior.len()
    );

    let report = crawler.crawl(pages, &prior).await?;

    // 델타를 먼저 기록해야 실패 시 다음 실행이 같은 델타를 다시 만듦
    table::write_deltas(delta_path, &report.deltas).context("Failed to persist deltas")?;
    store
        .replace_all(&report.baseline)
        .context("Failed to persist baseline")?;

    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================
