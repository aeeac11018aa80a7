//! 인덱스 병합
//!
//! 컬렉션별 인덱스의 모든 행을 읽어 통합 인덱스에 복사합니다.
//! 임베딩은 다시 계산하지 않고 저장된 값을 그대로 씁니다.

use anyhow::{Context, Result};

use crate::config::{MergeConfig, MAX_BACKEND_BATCH_SIZE};

use super::lance::LanceVectorStore;
use super::vector::VectorStore;

/// 병합 결과
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// (컬렉션 이름, 복사한 행 수)
    pub merged: Vec<(String, usize)>,
    /// 인덱스가 없어 건너뛴 컬렉션
    pub skipped: Vec<String>,
    /// 삽입 호출 횟수
    pub batches: usize,
}

impl MergeReport {
    pub fn total_rows(&self) -> usize {
        self.merged.iter().map(|(_, n)| n).sum()
    }
}

/// 저장소들을 대상 저장소로 복사
///
/// 모든 원본을 먼저 읽은 뒤 `reset`이면 대상을 비우고 삽입합니다.
/// 원본 읽기가 실패하면 대상은 건드리지 않습니다.
/// `batch_size`는 백엔드 한도(5461)를 넘지 않도록 잘립니다.
pub async fn merge_stores(
    target: &dyn VectorStore,
    sources: &[(String, &dyn VectorStore)],
    batch_size: usize,
    reset: bool,
) -> Result<MergeReport> {
    let batch_size = batch_size.clamp(1, MAX_BACKEND_BATCH_SIZE);
    let mut report = MergeReport::default();

    let mut scanned = Vec::with_capacity(sources.len());
    for (name, source) in sources {
        let entries = source
            .scan()
            .await
            .with_context(|| format!("Failed to read index for collection {}", name))?;
        scanned.push((name, entries));
    }

    if reset {
        target.clear().await.context("Failed to reset unified index")?;
    }

    for (name, entries) in scanned {
        for batch in entries.chunks(batch_size) {
            target
                .insert_batch(batch)
                .await
                .with_context(|| format!("Failed to merge collection {}", name))?;
            report.batches += 1;
        }

        tracing::info!("Merged {} rows from {}", entries.len(), name);
        report.merged.push((name.clone(), entries.len()));
    }

    Ok(report)
}

/// 설정에 따라 LanceDB 인덱스들을 통합 인덱스로 병합
///
/// `append`가 아니면 원본을 모두 읽은 뒤 통합 인덱스를 비웁니다.
pub async fn run_merge(config: &MergeConfig) -> Result<MergeReport> {
    let mut opened = Vec::new();
    let mut skipped = Vec::new();
    for (name, dir) in &config.sources {
        if !dir.exists() {
            tracing::warn!("Index for collection {} not found at {:?}, skipping", name, dir);
            skipped.push(name.clone());
            continue;
        }
        let store = LanceVectorStore::open(dir, config.dimension)
            .await
            .with_context(|| format!("Failed to open index for collection {}", name))?;
        opened.push((name.clone(), store));
    }

    let target = LanceVectorStore::open(&config.target_dir, config.dimension)
        .await
        .context("Failed to open unified index")?;

    let sources: Vec<(String, &dyn VectorStore)> = opened
        .iter()
        .map(|(name, store)| (name.clone(), store as &dyn VectorStore))
        .collect();

    let mut report = merge_stores(&target, &sources, config.batch_size, !config.append).await?;
    report.skipped = skipped;

    tracing::info!(
        "Unified index now holds {} rows",
        target.count().await.unwrap_or_default()
    );
    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================
