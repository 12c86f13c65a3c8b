//! 임베딩 모듈 - Ollama API를 통한 텍스트 벡터화
//!
//! 텍스트를 벡터로 변환하는 Ollama 임베딩 프로바이더입니다.
//! 청크 인덱싱과 질문 검색 양쪽에서 같은 모델을 사용해야 합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OllamaEmbedding::new("http://localhost:11434", "llama2", 0.35)?;
//! let embedding = embedder.embed("What causes anemia?").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::OllamaError;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 프로바이더 이름 (모델 이름)
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Embedding
// ============================================================================

/// 요청 타임아웃
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// 연결 실패/5xx/429 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
/// 배치 임베딩 진행 로그 간격 (청크 수)
const PROGRESS_EVERY: usize = 10;

/// Ollama 임베딩 구현체
///
/// `POST {host}/api/embeddings`
#[derive(Debug, Clone)]
pub struct OllamaEmbedding {
    host: String,
    model: String,
    temperature: f32,
    initial_backoff: Duration,
    client: reqwest::Client,
}

/// Ollama 임베딩 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    options: EmbedOptions,
}

#[derive(Debug, Serialize)]
struct EmbedOptions {
    temperature: f32,
}

/// Ollama 임베딩 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// 새 Ollama 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `host` - Ollama 서버 주소 (예: `http://localhost:11434`)
    /// * `model` - 임베딩 모델 이름
    /// * `temperature` - 요청 옵션으로 전달할 temperature
    pub fn new(
        host: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            initial_backoff: INITIAL_BACKOFF,
            client,
        })
    }

    /// 재시도 초기 백오프 변경 (재시도마다 두 배)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// 모델 이름
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.host)
    }

    /// 한 번의 API 호출
    async fn request_once(&self, text: &str) -> std::result::Result<Vec<f32>, OllamaError> {
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
            options: EmbedOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
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
            return Err(OllamaError::from_body(status.as_u16(), &body));
        }

        let parsed: EmbedResponse =
            serde_json::from_str(&body).map_err(|e| OllamaError::InvalidResponse(e.to_string()))?;

        if parsed.embedding.is_empty() {
            return Err(OllamaError::EmptyEmbedding(self.model.clone()));
        }

        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 0;

        // 재시도 루프 (연결 실패, 429, 5xx 에러 시 지수 백오프)
        loop {
            match self.request_once(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let backoff = self.initial_backoff * 2u32.pow(attempt);
                    tracing::warn!(
                        "Embedding request failed ({}), retrying in {:?} (attempt {}/{})",
                        e,
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama 임베딩 API는 한 번에 하나의 프롬프트만 받으므로 순차 처리
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            results.push(self.embed(text).await?);

            let done = i + 1;
            if done % PROGRESS_EVERY == 0 || done == texts.len() {
                tracing::info!("Embedded {}/{} chunks ({})", done, texts.len(), self.model);
            }
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에서 임베딩 프로바이더 생성
pub fn create_embedder(config: &AppConfig) -> Result<OllamaEmbedding> {
    let embedder = OllamaEmbedding::new(
        config.ollama_host.clone(),
        config.embed_model.clone(),
        config.embed_temperature,
    )?;
    tracing::info!(
        "Using Ollama embedding (model: {}, host: {})",
        embedder.model(),
        config.ollama_host
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
