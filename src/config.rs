//! 설정 모듈
//!
//! 기본값 → 환경변수 → CLI 플래그 순서로 덮어씁니다.
//!
//! | 환경변수 | 설명 |
//! |---|---|
//! | `OLLAMA_HOST` | Ollama 서버 주소 |
//! | `MEDICAL_RAG_PDF` | 원본 PDF 경로 |
//! | `MEDICAL_RAG_MODEL` | 답변 생성 모델 |
//! | `MEDICAL_RAG_EMBED_MODEL` | 임베딩 모델 |
//! | `MEDICAL_RAG_MAX_CHUNKS` | 인덱싱할 최대 청크 수 (0 = 전체) |
//! | `MEDICAL_RAG_TOP_K` | 검색할 청크 수 |
//! | `MEDICAL_RAG_DATA_DIR` | 데이터 디렉토리 |

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// 기본 원본 문서
pub const DEFAULT_PDF_PATH: &str = "The_GALE_ENCYCLOPEDIA_of_MEDICINE_SECOND.pdf";

/// 기본 Ollama 주소
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// 기본 모델 (임베딩 / 생성 공용)
pub const DEFAULT_MODEL: &str = "llama2";

/// 데이터 디렉토리 경로 (~/.medical-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".medical-rag")
}

// ============================================================================
// AppConfig
// ============================================================================

/// 애플리케이션 설정
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// 원본 PDF 경로
    pub pdf_path: PathBuf,
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 인덱싱할 최대 청크 수 (None = 전체)
    pub max_chunks: Option<usize>,
    /// 임베딩 모델
    pub embed_model: String,
    /// 임베딩 요청 temperature
    pub embed_temperature: f32,
    /// 답변 생성 모델
    pub llm_model: String,
    /// 답변 생성 temperature (None = 서버 기본값)
    pub llm_temperature: Option<f32>,
    /// 질문당 검색할 청크 수
    pub top_k: usize,
    /// Ollama 서버 주소 (끝의 `/` 제거됨)
    pub ollama_host: String,
    /// 인덱스/매니페스트 저장 위치
    pub data_dir: PathBuf,
    /// 디스크 인덱스 캐시 사용 여부
    pub use_cache: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pdf_path: PathBuf::from(DEFAULT_PDF_PATH),
            chunk_size: 1000,
            chunk_overlap: 20,
            max_chunks: Some(30),
            embed_model: DEFAULT_MODEL.to_string(),
            embed_temperature: 0.35,
            llm_model: DEFAULT_MODEL.to_string(),
            llm_temperature: None,
            top_k: crate::rag::DEFAULT_TOP_K,
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            data_dir: get_data_dir(),
            use_cache: true,
        }
    }
}

impl AppConfig {
    /// 기본값 + 프로세스 환경변수
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 기본값 + 임의의 조회 함수 (테스트용으로 분리)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("OLLAMA_HOST") {
            config.ollama_host = normalize_host(&host)?;
        }
        if let Some(pdf) = get("MEDICAL_RAG_PDF") {
            config.pdf_path = PathBuf::from(pdf);
        }
        if let Some(model) = get("MEDICAL_RAG_MODEL") {
            config.llm_model = model;
        }
        if let Some(model) = get("MEDICAL_RAG_EMBED_MODEL") {
            config.embed_model = model;
        }
        if let Some(max) = get("MEDICAL_RAG_MAX_CHUNKS") {
            let max: usize = max
                .trim()
                .parse()
                .with_context(|| format!("MEDICAL_RAG_MAX_CHUNKS 값이 잘못되었습니다: {}", max))?;
            config.max_chunks = (max > 0).then_some(max);
        }
        if let Some(k) = get("MEDICAL_RAG_TOP_K") {
            config.top_k = k
                .trim()
                .parse()
                .with_context(|| format!("MEDICAL_RAG_TOP_K 값이 잘못되었습니다: {}", k))?;
        }
        if let Some(dir) = get("MEDICAL_RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size는 0보다 커야 합니다");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "chunk_overlap({})은 chunk_size({})보다 작아야 합니다",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.top_k == 0 {
            bail!("top_k는 0보다 커야 합니다");
        }
        Ok(())
    }

    /// LanceDB 경로
    pub fn lance_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }

    /// 매니페스트 DB 경로
    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("index.db")
    }
}

/// Ollama 주소 정규화
///
/// 스킴이 없으면 `http://`를 붙이고 (Ollama의 `OLLAMA_HOST`와 동일),
/// 끝의 `/`를 제거합니다.
pub fn normalize_host(host: &str) -> Result<String> {
    let host = host.trim();
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };

    let parsed = url::Url::parse(&with_scheme)
        .with_context(|| format!("잘못된 Ollama 주소: {}", host))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Ollama 주소는 http 또는 https여야 합니다: {}", host);
    }
    if parsed.host_str().is_none() {
        bail!("Ollama 주소에 호스트가 없습니다: {}", host);
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 20);
        assert_eq!(config.max_chunks, Some(30));
        assert_eq!(config.top_k, 4);
        assert_eq!(config.embed_model, "llama2");
        assert!((config.embed_temperature - 0.35).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = config_from(&[
            ("OLLAMA_HOST", "127.0.0.1:11500"),
            ("MEDICAL_RAG_MODEL", "mistral"),
            ("MEDICAL_RAG_MAX_CHUNKS", "0"),
            ("MEDICAL_RAG_TOP_K", "6"),
            ("MEDICAL_RAG_DATA_DIR", "/tmp/medrag"),
        ])
        .unwrap();

        assert_eq!(config.ollama_host, "http://127.0.0.1:11500");
        assert_eq!(config.llm_model, "mistral");
        assert_eq!(config.embed_model, "llama2");
        assert_eq!(config.max_chunks, None);
        assert_eq!(config.top_k, 6);
        assert_eq!(config.lance_path(), PathBuf::from("/tmp/medrag/vectors.lance"));
    }

    #[test]
    fn test_empty_env_ignored() {
        let config = config_from(&[("MEDICAL_RAG_MODEL", "  ")]).unwrap();
        assert_eq!(config.llm_model, DEFAULT_MODEL);
    }

    #[test]
    fn test_invalid_number_env() {
        assert!(config_from(&[("MEDICAL_RAG_TOP_K", "many")]).is_err());
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("http://localhost:11434/").unwrap(),
            "http://localhost:11434"
        );
        assert_eq!(normalize_host("gpu-box:11434").unwrap(), "http://gpu-box:11434");
        assert!(normalize_host("ftp://localhost").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.chunk_overlap = config.chunk_size;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
