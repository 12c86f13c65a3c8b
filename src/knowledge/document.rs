//! 문서 로딩 및 분할
//!
//! PDF를 페이지 단위로 읽고, 페이지마다 재귀 분할기로 청크를 만듭니다.
//! 각 청크는 원본 페이지의 메타데이터(파일 경로, 페이지 번호)를 그대로 가집니다.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::extractor::{load_pdf_pages_async, PdfPage};

use super::chunker::{Chunker, RecursiveCharacterSplitter};

// ============================================================================
// Types
// ============================================================================

/// 문서 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// 원본 파일 경로
    pub source: String,
    /// 페이지 번호 (1부터 시작, 알 수 없으면 None)
    pub page: Option<usize>,
}

/// 검색 단위 문서 (청크)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// 청크 텍스트
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(
        page_content: impl Into<String>,
        source: impl Into<String>,
        page: Option<usize>,
    ) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                page,
            },
        }
    }

    /// 출처 표기 (`source` 또는 `source (p. N)`)
    pub fn source_label(&self) -> String {
        match self.metadata.page {
            Some(page) => format!("{} (p. {})", self.metadata.source, page),
            None => self.metadata.source.clone(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// PDF를 로드하여 청크로 분할
///
/// # Arguments
/// * `pdf_path` - PDF 파일 경로
/// * `chunk_size` - 청크 최대 크기 (문자 수)
/// * `chunk_overlap` - 청크 간 오버랩 (문자 수)
pub async fn load_and_split_documents(
    pdf_path: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Document>> {
    let splitter = RecursiveCharacterSplitter::with_size(chunk_size, chunk_overlap)
        .context("Invalid splitter configuration")?;

    let pages = load_pdf_pages_async(pdf_path)
        .await
        .with_context(|| format!("Error loading document: {}", pdf_path.display()))?;

    let documents = split_documents(&pages, &splitter);
    tracing::info!(
        "Split {} pages into {} chunks (size={}, overlap={})",
        pages.len(),
        documents.len(),
        chunk_size,
        chunk_overlap
    );

    Ok(documents)
}

/// 페이지 목록을 청크 문서로 분할 (페이지 순서 유지)
pub fn split_documents(pages: &[PdfPage], chunker: &dyn Chunker) -> Vec<Document> {
    pages
        .iter()
        .flat_map(|page| {
            chunker
                .chunk(&page.text)
                .into_iter()
                .map(move |chunk| {
                    Document::new(chunk, page.source.clone(), Some(page.page_number))
                })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
