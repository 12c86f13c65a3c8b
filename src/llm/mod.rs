//! LLM 모듈 - Ollama 텍스트 생성
//!
//! 완성된 프롬프트를 받아 답변 텍스트를 돌려주는 얇은 클라이언트입니다.
//! 스트리밍 없이 한 번에 응답을 받습니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::OllamaError;

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 언어 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 프롬프트에 대한 답변 생성
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama LLM
// ============================================================================

/// 생성은 CPU 추론 시 수 분이 걸릴 수 있음
const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama 생성 클라이언트
///
/// `POST {host}/api/generate`
#[derive(Debug, Clone)]
pub struct OllamaLlm {
    host: String,
    model: String,
    temperature: Option<f32>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

impl OllamaLlm {
    /// 새 클라이언트 생성
    ///
    /// # Arguments
    /// * `host` - Ollama 서버 주소
    /// * `model` - 모델 이름 (예: `llama2`)
    /// * `temperature` - None이면 모델 기본값
    pub fn new(
        host: impl Into<String>,
        model: impl Into<String>,
        temperature: Option<f32>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.temperature.map(|temperature| GenerateOptions { temperature }),
        }
    }

    /// 서버 응답 여부 확인 (`GET /api/tags`)
    pub async fn health_check(&self) -> Result<(), OllamaError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.host))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|source| OllamaError::Connection {
                host: self.host.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(OllamaError::from_body(status.as_u16(), &body))
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.host))
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|source| OllamaError::Connection {
                host: self.host.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OllamaError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(OllamaError::from_body(status.as_u16(), &body).into());
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| OllamaError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            "Generated {} chars ({:?} tokens) with {}",
            parsed.response.len(),
            parsed.eval_count,
            self.model
        );

        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// 설정에서 LLM 클라이언트 생성
pub fn setup_llm(config: &AppConfig) -> Result<OllamaLlm> {
    let llm = OllamaLlm::new(
        config.ollama_host.clone(),
        config.llm_model.clone(),
        config.llm_temperature,
    )
    .context("Error setting up LLM")?;
    tracing::info!("Using Ollama LLM (model: {})", llm.name());
    Ok(llm)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_without_temperature() {
        let llm = OllamaLlm::new("http://localhost:11434", "llama2", None).unwrap();
        let json = serde_json::to_value(llm.request_body("hi")).unwrap();
        assert_eq!(json["model"], "llama2");
        assert_eq!(json["prompt"], "hi");
        assert_eq!(json["stream"], false);
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_request_body_with_temperature() {
        let llm = OllamaLlm::new("http://localhost:11434/", "llama2", Some(0.25)).unwrap();
        let json = serde_json::to_value(llm.request_body("hi")).unwrap();
        assert_eq!(json["options"]["temperature"], 0.25);
        assert_eq!(llm.host(), "http://localhost:11434");
    }

    #[test]
    fn test_response_parse_ignores_extra_fields() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"model":"llama2","response":"**Anemia** is...","done":true,"eval_count":42}"#,
        )
        .unwrap();
        assert_eq!(parsed.response, "**Anemia** is...");
        assert_eq!(parsed.eval_count, Some(42));
    }

    #[test]
    fn test_setup_llm_uses_config_model() {
        let mut config = AppConfig::default();
        config.llm_model = "mistral".to_string();
        let llm = setup_llm(&config).unwrap();
        assert_eq!(llm.name(), "mistral");
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let llm = OllamaLlm::new("http://127.0.0.1:9", "llama2", None).unwrap();
        assert!(matches!(
            llm.health_check().await,
            Err(OllamaError::Connection { .. })
        ));
    }
}
