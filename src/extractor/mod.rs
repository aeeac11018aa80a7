//! 콘텐츠 추출 모듈
//!
//! 수집된 파일에서 인덱싱할 텍스트를 꺼냅니다.
//! - 텍스트 파일: 원문 그대로 읽기 (옵션으로 HTML -> 본문 텍스트 변환)
//! - PDF 파일: pdf-extract로 페이지별 추출 후 연결
//!
//! 추출 실패는 에러로 전파됩니다.

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

use crate::collector::{CollectedFile, FileType};
use crate::scraper::{html_to_text, looks_like_html};

// ============================================================================
// Extracted Content
// ============================================================================

/// 추출된 콘텐츠
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// 추출된 텍스트
    pub text: String,
    /// 원본 파일 타입
    pub source_type: FileType,
    /// 페이지 수 (PDF)
    pub total_pages: Option<usize>,
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 콘텐츠 추출기
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor {
    /// HTML 본문을 텍스트로 변환할지 여부 (.txt만 해당)
    strip_html: bool,
}

impl ContentExtractor {
    pub fn new(strip_html: bool) -> Self {
        Self { strip_html }
    }

    /// 파일에서 콘텐츠 추출
    pub async fn extract(&self, file: &CollectedFile) -> Result<ExtractedContent> {
        match file.file_type {
            FileType::Text => self.extract_text(&file.path).await,
            FileType::Pdf => self.extract_pdf(&file.path).await,
        }
    }

    async fn extract_text(&self, path: &Path) -> Result<ExtractedContent> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        let text = if self.strip_html && looks_like_html(&raw) {
            html_to_text(&raw)
        } else {
            raw
        };

        Ok(ExtractedContent {
            text,
            source_type: FileType::Text,
            total_pages: None,
        })
    }

    async fn extract_pdf(&self, path: &Path) -> Result<ExtractedContent> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_pages(&owned))
            .await
            .context("PDF extraction task failed")??;

        Ok(ExtractedContent {
            text: pdf::join_pages(&pages),
            source_type: FileType::Pdf,
            total_pages: Some(pages.len()),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
