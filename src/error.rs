//! 에러 타입
//!
//! Ollama HTTP 클라이언트 에러만 타입으로 정의하고,
//! 나머지 흐름은 anyhow로 전파합니다.

use thiserror::Error;

/// Ollama API 호출 에러
#[derive(Debug, Error)]
pub enum OllamaError {
    /// 요청 전송 실패 (서버 미실행, 네트워크 오류 등)
    #[error("Ollama 서버에 연결할 수 없습니다 ({host}): {source}")]
    Connection {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP 에러 응답
    #[error("Ollama API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 응답 본문 파싱 실패
    #[error("Ollama 응답 파싱 실패: {0}")]
    InvalidResponse(String),

    /// 빈 임베딩 반환 (모델이 임베딩을 지원하지 않는 경우)
    #[error("모델 '{0}'이(가) 빈 임베딩을 반환했습니다")]
    EmptyEmbedding(String),
}

impl OllamaError {
    /// 재시도 가능한 에러인지 (연결 실패, 429, 5xx)
    pub fn is_retryable(&self) -> bool {
        match self {
            OllamaError::Connection { .. } => true,
            OllamaError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP 응답 본문에서 에러 생성
    ///
    /// Ollama는 `{"error": "..."}` 형태로 에러를 반환합니다.
    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            error: String,
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| body.trim().to_string());

        OllamaError::Api { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_json() {
        let err = OllamaError::from_body(404, r#"{"error":"model 'llama9' not found"}"#);
        match err {
            OllamaError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "model 'llama9' not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_body_plain_text() {
        let err = OllamaError::from_body(502, "  Bad Gateway\n");
        assert_eq!(err.to_string(), "Ollama API error (502): Bad Gateway");
    }

    #[test]
    fn test_is_retryable() {
        assert!(OllamaError::from_body(503, "").is_retryable());
        assert!(OllamaError::from_body(429, "").is_retryable());
        assert!(!OllamaError::from_body(404, "").is_retryable());
        assert!(!OllamaError::InvalidResponse("x".into()).is_retryable());
    }
}
