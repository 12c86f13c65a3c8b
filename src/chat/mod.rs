//! 채팅 세션 - 대화 기록 관리
//!
//! 질문마다 체인을 호출하고, 성공/실패와 관계없이
//! 사용자 메시지와 어시스턴트 메시지를 순서대로 기록합니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rag::{format_medical_answer, get_sources_from_response, RetrievalChain};

// ============================================================================
// Types
// ============================================================================

/// 메시지 작성자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// 대화 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 한 번의 질의응답 결과
#[derive(Debug, Clone)]
pub struct ChatTurn {
    /// 기록에 추가된 어시스턴트 메시지
    pub message: ChatMessage,
    /// 답변에 사용된 출처 (에러 시 비어 있음)
    pub sources: Vec<String>,
    /// 체인 실행 실패 여부
    pub is_error: bool,
}

// ============================================================================
// ChatSession
// ============================================================================

/// 대화 세션
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 질문 처리
    ///
    /// 공백뿐인 입력은 무시하고 None을 반환합니다.
    /// 체인 에러는 `An error occurred: ...` 메시지로 기록됩니다.
    pub async fn ask(&mut self, chain: &RetrievalChain, input: &str) -> Option<ChatTurn> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        self.messages.push(ChatMessage::new(Role::User, input));

        let turn = match chain.invoke(input).await {
            Ok(response) => ChatTurn {
                message: ChatMessage::new(Role::Assistant, format_medical_answer(&response.answer)),
                sources: get_sources_from_response(&response),
                is_error: false,
            },
            Err(e) => {
                tracing::warn!("Chain invocation failed: {:#}", e);
                ChatTurn {
                    message: ChatMessage::new(
                        Role::Assistant,
                        format!("An error occurred: {:#}", e),
                    ),
                    sources: Vec::new(),
                    is_error: true,
                }
            }
        };

        self.messages.push(turn.message.clone());
        Some(turn)
    }

    /// 대화 기록
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// 대화 기록 삭제
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::knowledge::{Document, MemoryVectorStore};
    use crate::llm::LanguageModel;
    use crate::rag::setup_retrieval_chain;
    use crate::rag::setup_vector_store;
    use crate::rag::testing::{EchoLlm, FailingEmbedder, FailingLlm, KeywordEmbedder};

    async fn chain_with(llm: Arc<dyn LanguageModel>) -> RetrievalChain {
        let store = Arc::new(MemoryVectorStore::new());
        let docs = vec![
            Document::new("Anemia lowers red blood cells.", "gale.pdf", Some(7)),
            Document::new("Acne affects the skin.", "gale.pdf", Some(2)),
        ];
        setup_vector_store(&docs, &KeywordEmbedder, store.as_ref())
            .await
            .unwrap();
        setup_retrieval_chain(store, Arc::new(KeywordEmbedder), llm, 1)
    }

    #[tokio::test]
    async fn test_ask_records_both_messages() {
        let chain = chain_with(Arc::new(EchoLlm)).await;
        let mut session = ChatSession::new();

        let turn = session.ask(&chain, "  What is anemia in red blood cells?  ").await.unwrap();

        assert!(!turn.is_error);
        assert_eq!(turn.sources, vec!["gale.pdf (p. 7)"]);

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "What is anemia in red blood cells?");
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[1].content.starts_with("Answer the following medical question"));
        assert_eq!(messages[1], turn.message);
    }

    #[tokio::test]
    async fn test_ask_ignores_blank_input() {
        let chain = chain_with(Arc::new(EchoLlm)).await;
        let mut session = ChatSession::new();

        assert!(session.ask(&chain, "   \n").await.is_none());
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_llm_error_becomes_assistant_message() {
        let chain = chain_with(Arc::new(FailingLlm)).await;
        let mut session = ChatSession::new();

        let turn = session.ask(&chain, "What is acne?").await.unwrap();

        assert!(turn.is_error);
        assert!(turn.sources.is_empty());
        assert!(turn.message.content.starts_with("An error occurred: "));
        assert!(turn.message.content.contains("model not loaded"));
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_retrieval_error_becomes_assistant_message() {
        let store = Arc::new(MemoryVectorStore::new());
        let chain = setup_retrieval_chain(store, Arc::new(FailingEmbedder), Arc::new(EchoLlm), 4);
        let mut session = ChatSession::new();

        let turn = session.ask(&chain, "fever").await.unwrap();
        assert!(turn.is_error);
        assert!(turn.message.content.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_history_accumulates_and_clears() {
        let chain = chain_with(Arc::new(EchoLlm)).await;
        let mut session = ChatSession::new();

        session.ask(&chain, "anemia").await;
        session.ask(&chain, "acne").await;
        assert_eq!(session.messages().len(), 4);
        assert_eq!(session.messages()[2].content, "acne");

        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn test_role_serialization() {
        let msg = ChatMessage::new(Role::Assistant, "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(Role::User.to_string(), "user");
    }
}
