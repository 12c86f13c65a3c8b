//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 페이지별 텍스트를 추출합니다.

use std::path::Path;

use anyhow::{Context, Result};

/// PDF에서 페이지별 텍스트 추출
///
/// (페이지 번호, 텍스트) 튜플 벡터를 반환합니다. 페이지 번호는 1부터 시작합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;
    extract_text_from_bytes(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))
}

/// 메모리 상의 PDF에서 페이지별 텍스트 추출
///
/// 텍스트가 없는 페이지도 번호를 유지한 채 빈 문자열로 남깁니다.
pub fn extract_text_from_bytes(bytes: &[u8]) -> Result<Vec<(usize, String)>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)?;

    if pages.iter().all(|text| text.trim().is_empty()) {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
    }

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text.trim().to_string()))
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
