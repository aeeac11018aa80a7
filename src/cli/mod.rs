//! CLI 모듈
//!
//! campus-rag CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{
    self, get_data_dir, CollectionLayout, CrawlConfig, IndexConfig, MergeConfig, QaConfig,
    DATA_DIR_ENV, DEFAULT_BATCH_SIZE, DEFAULT_TOP_K,
};
use crate::crawler::run_crawl;
use crate::embedding::create_embedder;
use crate::gemini::has_api_key;
use crate::indexer::run_index;
use crate::knowledge::{run_merge, LanceVectorStore, VectorStore};
use crate::llm::GeminiChat;
use crate::qa::QaService;
use crate::table;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "campus-rag")]
#[command(version, about = "대학 웹페이지 변경 감지 크롤러 + RAG 질의응답", long_about = None)]
pub struct Cli {
    /// 데이터 디렉토리 (기본: <local data dir>/.campus-rag)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 페이지 목록을 가져와 신규/변경 페이지 기록
    Crawl {
        /// 컬렉션 이름 (예: academics, admission)
        #[arg(short, long)]
        collection: String,

        /// 입력 테이블 (Page_Name, Link)
        #[arg(long)]
        pages: Option<PathBuf>,

        /// 페이지 파일 저장 디렉토리
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// 기준선 경로 (.csv 또는 .db/.sqlite)
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// 변경 목록 경로
        #[arg(long)]
        delta: Option<PathBuf>,

        /// 페이지당 타임아웃 (초)
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// 컬렉션 디렉토리를 벡터 인덱스로 인덱싱
    Index {
        /// 컬렉션 이름
        #[arg(short, long)]
        collection: String,

        /// 인덱싱할 디렉토리 (기본: 컬렉션 static 디렉토리)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 싱크 호출당 패시지 수 (최대 5461)
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// .txt 파일의 HTML을 본문 텍스트로 변환
        #[arg(long)]
        strip_html: bool,

        /// 기존 인덱스를 비우지 않고 추가
        #[arg(long)]
        append: bool,
    },

    /// 컬렉션 인덱스들을 통합 인덱스로 병합
    Merge {
        /// 병합할 컬렉션 이름들
        #[arg(required = true)]
        collections: Vec<String>,

        /// 통합 인덱스를 비우지 않고 추가
        #[arg(long)]
        append: bool,
    },

    /// 통합 인덱스에 질문
    Ask {
        /// 질문
        query: String,

        /// 검색할 패시지 수
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// 통합 인덱스 대신 특정 컬렉션에 질문
        #[arg(short, long)]
        collection: Option<String>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir.unwrap_or_else(get_data_dir);

    match cli.command {
        Commands::Crawl {
            collection,
            pages,
            output_dir,
            baseline,
            delta,
            timeout,
        } => {
            let mut config = CrawlConfig::for_collection(&CollectionLayout::new(
                data_dir.as_path(),
                collection,
            ));
            if let Some(pages) = pages {
                config.pages_table = pages;
            }
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if let Some(baseline) = baseline {
                config.baseline_path = baseline;
            }
            if let Some(delta) = delta {
                config.delta_path = delta;
            }
            config.timeout = Duration::from_secs(timeout);
            cmd_crawl(&config).await
        }
        Commands::Index {
            collection,
            dir,
            batch_size,
            strip_html,
            append,
        } => {
            let mut config = IndexConfig::for_collection(&CollectionLayout::new(
                data_dir.as_path(),
                collection,
            ));
            if let Some(dir) = dir {
                config.source_dir = dir;
            }
            config.batch_size = batch_size;
            config.strip_html = strip_html;
            config.append = append;
            cmd_index(&config).await
        }
        Commands::Merge {
            collections,
            append,
        } => {
            let mut config = MergeConfig::unified(&data_dir, &collections);
            config.append = append;
            cmd_merge(&config).await
        }
        Commands::Ask {
            query,
            top_k,
            collection,
        } => {
            let mut config = QaConfig::unified(&data_dir);
            if let Some(collection) = collection {
                config.vector_dir = config::vector_dir(&data_dir, &collection);
            }
            config.top_k = top_k;
            cmd_ask(&query, &config).await
        }
        Commands::Status => cmd_status(&data_dir).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

/// 크롤링 명령어 (crawl)
async fn cmd_crawl(config: &CrawlConfig) -> Result<()> {
    println!("[*] 입력 테이블: {}", config.pages_table.display());
    println!("[*] 저장 위치: {}", config.output_dir.display());

    let report = run_crawl(config).await.context("크롤링 실패")?;

    println!();
    println!(
        "[OK] 완료: 저장 {}, 신규 {}, 변경 {}, 동일 {}, 실패 {}",
        report.saved,
        report.new_pages(),
        report.updated_pages(),
        report.unchanged,
        report.failures.len()
    );

    for delta in &report.deltas {
        let tag = if delta.is_new() { "NEW" } else { "UPD" };
        println!("  [{}] {} ({})", tag, delta.name, delta.url);
    }

    for failure in &report.failures {
        println!("  [!] {} ({}): {}", failure.name, failure.url, failure.reason);
    }

    for (first, second) in &report.collisions {
        println!("  [!] 파일 이름 충돌: {} / {}", first, second);
    }

    println!();
    println!("[*] 기준선: {}", config.baseline_path.display());
    println!("[*] 변경 목록: {}", config.delta_path.display());

    Ok(())
}

/// 인덱싱 명령어 (index)
async fn cmd_index(config: &IndexConfig) -> Result<()> {
    require_api_key()?;

    println!("[*] 인덱싱 대상: {}", config.source_dir.display());
    if config.batch_size != config.effective_batch_size() {
        println!(
            "[!] 배치 크기 {} -> {} 로 조정됩니다",
            config.batch_size,
            config.effective_batch_size()
        );
    }

    let embedder = Arc::new(create_embedder()?);
    let report = run_index(config, embedder).await.context("인덱싱 실패")?;

    println!(
        "[OK] 완료: 파일 {}, 패시지 {}, 배치 {}",
        report.files, report.passages, report.batches
    );
    println!("     인덱스: {}", config.vector_dir.display());

    Ok(())
}

/// 병합 명령어 (merge)
async fn cmd_merge(config: &MergeConfig) -> Result<()> {
    println!("[*] 통합 인덱스: {}", config.target_dir.display());

    let report = run_merge(config).await.context("병합 실패")?;

    for (name, rows) in &report.merged {
        println!("  [OK] {}: {} 행", name, rows);
    }
    for name in &report.skipped {
        println!("  [!] {}: 인덱스 없음, 건너뜀", name);
    }

    println!();
    println!(
        "[OK] 완료: {} 행, 배치 {}",
        report.total_rows(),
        report.batches
    );

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(query: &str, config: &QaConfig) -> Result<()> {
    require_api_key()?;

    if !config.vector_dir.exists() {
        bail!(
            "인덱스를 찾을 수 없습니다: {}\n\
             먼저 index / merge 명령어를 실행하세요.",
            config.vector_dir.display()
        );
    }

    println!("[*] 질문: \"{}\"", query);

    let embedder = Arc::new(create_embedder()?);
    let llm = Arc::new(GeminiChat::from_env()?);
    let service = QaService::open(config, embedder, llm)
        .await
        .context("질의응답 초기화 실패")?;

    let answer = service.ask(query).await.context("답변 생성 실패")?;

    println!("\n[OK] 답변:\n");
    println!("{}", answer.text);

    if !answer.sources.is_empty() {
        println!("\n[*] 참고 패시지 ({} 건):", answer.sources.len());
        for (i, source) in answer.sources.iter().enumerate() {
            println!(
                "{}. [유사도: {:.4}] {} #{}",
                i + 1,
                source.similarity,
                source.source,
                source.chunk_index
            );
            println!("   {}", truncate_text(&source.text, 120));
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(data_dir: &Path) -> Result<()> {
    println!("campus-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    let collections = list_collections(data_dir)?;
    if collections.is_empty() {
        println!("[!] 컬렉션이 없습니다.");
        return Ok(());
    }

    println!();
    for name in collections {
        let layout = CollectionLayout::new(data_dir, name.as_str());
        println!("[{}]", name);

        let baseline = layout.baseline_path();
        if baseline.exists() {
            match table::open_baseline_store(&baseline).and_then(|s| s.load_all()) {
                Ok(records) => println!("  기준선: {} 페이지", records.len()),
                Err(e) => println!("  [!] 기준선 읽기 실패: {}", e),
            }
        }

        let delta = layout.delta_path();
        if delta.exists() {
            match table::load_deltas(&delta) {
                Ok(deltas) => println!("  최근 변경: {} 페이지", deltas.len()),
                Err(e) => println!("  [!] 변경 목록 읽기 실패: {}", e),
            }
        }

        let output_dir = layout.output_dir();
        if output_dir.exists() {
            let (files, bytes) = dir_usage(&output_dir);
            println!("  페이지 파일: {} 개 ({})", files, format_bytes(bytes));
        }

        let vector_dir = layout.vector_dir();
        if vector_dir.exists() {
            match count_vectors(&vector_dir).await {
                Ok(count) => println!("  벡터 인덱스: {} 패시지", count),
                Err(e) => tracing::debug!("벡터 통계 조회 실패: {}", e),
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 데이터 디렉토리에 흔적이 있는 컬렉션 이름 (정렬, 중복 제거)
fn list_collections(data_dir: &Path) -> Result<Vec<String>> {
    let mut names = std::collections::BTreeSet::new();

    for sub in ["pages", "baseline", "vectordb", "static"] {
        let dir = data_dir.join(sub);
        if !dir.is_dir() {
            continue;
        }
        let entries =
            std::fs::read_dir(&dir).with_context(|| format!("Failed to read {:?}", dir))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let stem = if sub == "static" {
                path.is_dir().then(|| path.file_name()).flatten()
            } else {
                path.file_stem()
            };
            if let Some(stem) = stem.and_then(|s| s.to_str()) {
                names.insert(stem.to_string());
            }
        }
    }

    Ok(names.into_iter().collect())
}

/// 디렉토리 내 파일 수와 총 크기
fn dir_usage(dir: &Path) -> (usize, usize) {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .fold((0, 0), |(files, bytes), e| {
            let size = e.metadata().map(|m| m.len() as usize).unwrap_or(0);
            (files + 1, bytes + size)
        })
}

async fn count_vectors(vector_dir: &Path) -> Result<usize> {
    // 개수 조회에는 차원이 쓰이지 않음
    let store = LanceVectorStore::open(vector_dir, crate::embedding::DEFAULT_DIMENSION).await?;
    store.count().await
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
