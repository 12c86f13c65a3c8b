//! 콘텐츠 추출 모듈
//!
//! 원본 PDF를 페이지 단위 텍스트로 읽어옵니다.

pub mod pdf;

#[cfg(test)]
pub(crate) mod testing;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// PDF 한 페이지
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    /// 원본 파일 경로 (입력된 그대로)
    pub source: String,
    /// 페이지 번호 (1부터 시작)
    pub page_number: usize,
    /// 페이지 텍스트
    pub text: String,
}

/// PDF를 페이지 목록으로 로드 (동기)
pub fn load_pdf_pages(path: &Path) -> Result<Vec<PdfPage>> {
    let source = path.display().to_string();
    let pages = pdf::extract_text_from_pdf(path)?;

    tracing::info!("Loaded {} pages from {}", pages.len(), source);

    Ok(pages
        .into_iter()
        .map(|(page_number, text)| PdfPage {
            source: source.clone(),
            page_number,
            text,
        })
        .collect())
}

/// PDF를 페이지 목록으로 로드 (async)
///
/// PDF 파싱은 CPU 바운드이므로 spawn_blocking에서 실행합니다.
pub async fn load_pdf_pages_async(path: &Path) -> Result<Vec<PdfPage>> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || load_pdf_pages(&path))
        .await
        .context("PDF extraction task failed")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use super::testing::build_pdf;

    #[tokio::test]
    async fn test_load_pdf_pages_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gale.pdf");
        std::fs::write(&path, build_pdf(&["Acne is a skin disease.", "Anemia"])).unwrap();

        let pages = load_pdf_pages_async(&path).await.unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[1].page_number, 2);
        assert_eq!(pages[0].source, path.display().to_string());
        assert!(pages[0].text.contains("Acne is a skin disease."));
        assert!(pages[1].text.contains("Anemia"));
    }

    #[tokio::test]
    async fn test_load_missing_pdf_async() {
        let result = load_pdf_pages_async(Path::new("does-not-exist.pdf")).await;
        assert!(result.is_err());
    }
}
