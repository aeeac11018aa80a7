//! 파일 수집 모듈
//!
//! 크롤링 결과 디렉토리를 재귀 순회하여 인덱싱할 `.txt` / `.pdf` 파일을 모읍니다.
//! 결과는 경로 순으로 정렬되므로 실행마다 순서가 같습니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

// ============================================================================
// File Types
// ============================================================================

/// 지원하는 파일 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// 텍스트 파일 (원문 그대로 읽음)
    Text,
    /// PDF 파일 (페이지별 텍스트 추출)
    Pdf,
}

impl FileType {
    /// 확장자로 파일 타입 결정 (대소문자 무시)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "txt" => Some(FileType::Text),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    pub path: PathBuf,
    pub file_type: FileType,
    /// 파일 크기 (바이트)
    pub size: u64,
}

// ============================================================================
// File Collector
// ============================================================================

/// 디렉토리 재귀 수집
///
/// 지원하지 않는 확장자는 건너뜁니다. 순회 중 읽을 수 없는 항목은 에러로 전파합니다.
pub fn collect_directory(root: &Path) -> Result<Vec<CollectedFile>> {
    if !root.exists() {
        anyhow::bail!("Directory not found: {:?}", root);
    }
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {:?}", root);
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", root))?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_type) = FileType::from_path(entry.path()) else {
            tracing::debug!("Skipping unsupported file: {:?}", entry.path());
            continue;
        };

        let size = entry
            .metadata()
            .with_context(|| format!("Failed to read metadata: {:?}", entry.path()))?
            .len();

        files.push(CollectedFile {
            path: entry.into_path(),
            file_type,
            size,
        });
    }

    // 디렉토리와 파일이 섞여도 전체 경로 기준으로 정렬
    files.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::info!("Collected {} files from {:?}", files.len(), root);
    Ok(files)
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_files: usize,
    pub text_files: usize,
    pub pdf_files: usize,
    pub total_size: u64,
}

impl CollectionStats {
    /// 수집된 파일 목록에서 통계 계산
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;

            match file.file_type {
                FileType::Text => stats.text_files += 1,
                FileType::Pdf => stats.pdf_files += 1,
            }
        }

        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
