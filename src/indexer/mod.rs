//! 코퍼스 인덱서
//!
//! 디렉토리의 `.txt` / `.pdf` 파일을 읽어 패시지로 나누고,
//! 고정 크기 배치로 인덱스 싱크에 넘깁니다.
//!
//! 모든 파일의 추출과 분할이 끝난 뒤에 싱크로 전송하므로,
//! 중간에 추출이 실패하면 아무 것도 쓰지 않고 중단됩니다.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::collector::{collect_directory, CollectionStats};
use crate::config::IndexConfig;
use crate::embedding::EmbeddingProvider;
use crate::extractor::ContentExtractor;
use crate::knowledge::{Chunker, KnowledgeIndex, RecursiveSplitter};

// ============================================================================
// Types
// ============================================================================

/// 인덱싱 단위 패시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// 원본 파일 경로
    pub source: String,
    /// 파일 내 순번 (0-based)
    pub index: usize,
    pub text: String,
}

/// 인덱싱 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// 처리한 파일 수
    pub files: usize,
    /// 싱크에 넘긴 패시지 수
    pub passages: usize,
    /// 싱크 호출 횟수
    pub batches: usize,
}

/// 패시지를 받아 저장하는 대상
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// 패시지 배치 저장, 저장된 개수 반환
    async fn add_passages(&self, passages: &[Passage]) -> Result<usize>;
}

// ============================================================================
// CorpusIndexer
// ============================================================================

pub struct CorpusIndexer {
    extractor: ContentExtractor,
    splitter: RecursiveSplitter,
    batch_size: usize,
}

impl CorpusIndexer {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        Ok(Self {
            extractor: ContentExtractor::new(config.strip_html),
            splitter: RecursiveSplitter::new(config.chunk.clone())
                .context("Invalid chunk configuration")?,
            batch_size: config.effective_batch_size(),
        })
    }

    /// 디렉토리 전체를 패시지로 변환
    pub async fn passages(&self, root: &Path) -> Result<(usize, Vec<Passage>)> {
        let files = collect_directory(root)?;
        let stats = CollectionStats::from_files(&files);
        tracing::info!(
            "Indexing {} files ({} text, {} pdf, {} bytes)",
            stats.total_files,
            stats.text_files,
            stats.pdf_files,
            stats.total_size
        );

        let mut passages = Vec::new();
        for file in &files {
            let content = self
                .extractor
                .extract(file)
                .await
                .with_context(|| format!("Failed to extract {:?}", file.path))?;

            let source = file.path.display().to_string();
            if let Some(pages) = content.total_pages {
                tracing::debug!("{}: {} pages", source, pages);
            }
            let chunks = self.splitter.chunk(&content.text);
            if chunks.is_empty() {
                tracing::debug!("No passages for {}", source);
            }

            passages.extend(chunks.into_iter().enumerate().map(|(index, text)| Passage {
                source: source.clone(),
                index,
                text,
            }));
        }

        Ok((files.len(), passages))
    }

    /// 인덱싱 실행
    pub async fn run(&self, root: &Path, sink: &dyn IndexSink) -> Result<IndexReport> {
        let (files, passages) = self.passages(root).await?;
        self.submit(files, &passages, sink).await
    }

    /// 준비된 패시지를 배치 단위로 싱크에 전송
    pub async fn submit(
        &self,
        files: usize,
        passages: &[Passage],
        sink: &dyn IndexSink,
    ) -> Result<IndexReport> {
        let mut report = IndexReport {
            files,
            ..Default::default()
        };

        let total_batches = passages.len().div_ceil(self.batch_size);
        for batch in passages.chunks(self.batch_size) {
            report.batches += 1;
            tracing::info!(
                "Submitting batch {}/{} ({} passages)",
                report.batches,
                total_batches,
                batch.len()
            );
            report.passages += sink
                .add_passages(batch)
                .await
                .with_context(|| format!("Failed to index batch {}", report.batches))?;
        }

        tracing::info!(
            "Indexed {} passages from {} files in {} batches",
            report.passages,
            report.files,
            report.batches
        );
        Ok(report)
    }
}

/// 컬렉션 디렉토리를 벡터 인덱스로 인덱싱
///
/// `append`가 아니면 기존 인덱스를 비운 뒤 다시 채웁니다.
/// 추출이 모두 성공한 뒤에만 비우므로 실패 시 기존 인덱스는 그대로입니다.
pub async fn run_index(
    config: &IndexConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<IndexReport> {
    let indexer = CorpusIndexer::new(config)?;
    let (files, passages) = indexer.passages(&config.source_dir).await?;

    let index = KnowledgeIndex::open(&config.vector_dir, embedder).await?;
    if !config.append {
        index.clear().await?;
    }

    indexer.submit(files, &passages, &index).await
}

// ============================================================================
// Tests
// ============================================================================
