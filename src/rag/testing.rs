//! 테스트용 임베딩/LLM 구현
//!
//! Ollama 서버 없이 체인과 채팅 흐름을 검증합니다.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::llm::LanguageModel;

/// 고정 어휘의 단어 빈도 벡터
const VOCABULARY: [&str; 10] = [
    "anemia", "red", "blood", "cells", "asthma", "airways", "lungs", "acne", "skin", "face",
];

/// 어휘 단어 출현 횟수를 벡터로 쓰는 임베더
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        Ok(VOCABULARY
            .iter()
            .map(|v| words.iter().filter(|w| *w == v).count() as f32)
            .collect())
    }

    fn name(&self) -> &str {
        "keyword-test"
    }
}

/// 프롬프트를 그대로 돌려주는 LLM
pub struct EchoLlm;

#[async_trait]
impl LanguageModel for EchoLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// 항상 실패하는 LLM
pub struct FailingLlm;

#[async_trait]
impl LanguageModel for FailingLlm {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("model not loaded")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// 항상 실패하는 임베더
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("connection refused")
    }

    fn name(&self) -> &str {
        "failing"
    }
}
