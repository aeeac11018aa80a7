//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;

use anyhow::{Context, Result};

/// PDF에서 페이지별 텍스트 추출
///
/// 페이지 순서대로 텍스트를 반환합니다. 각 페이지는 앞뒤 공백을 잘라내고,
/// 빈 페이지는 제외합니다. 텍스트가 없는 PDF(스캔본 등)는 빈 벡터를 돌려줍니다.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(split_pdf_pages(&text))
}

/// 정규화된 페이지 텍스트를 하나의 문서로 연결
///
/// [`extract_pages`]의 결과(공백 정리, 빈 페이지 제외)를 `\n`으로 이어 붙입니다.
/// 원문 페이지 텍스트를 그대로 이어 붙인 것과는 공백이 다를 수 있습니다.
pub fn join_pages(pages: &[String]) -> String {
    pages.join("\n")
}

/// 폼피드 문자(\x0c)로 페이지 분리
fn split_pdf_pages(text: &str) -> Vec<String> {
    text.split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
