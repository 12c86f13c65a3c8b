//! 검색 체인 (Retriever → Prompt → LLM)
//!
//! 질문을 임베딩하여 상위 k개 청크를 찾고,
//! 청크 본문을 모두 프롬프트의 `{context}`에 채워 넣은 뒤 LLM에 전달합니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{Document, VectorStore};
use crate::llm::LanguageModel;

use super::prompt::{create_medical_prompt, PromptTemplate};

/// 기본 검색 청크 수
pub const DEFAULT_TOP_K: usize = 4;

/// 문서 결합 구분자
const DOCUMENT_SEPARATOR: &str = "\n\n";

// ============================================================================
// Retriever
// ============================================================================

/// 벡터 검색기
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        k: usize,
    ) -> Self {
        Self { embedder, store, k }
    }

    /// 질문과 가장 가까운 k개 청크 (가까운 순)
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed question")?;

        let results = self
            .store
            .search(&query_embedding, self.k)
            .await
            .context("Vector search failed")?;

        tracing::debug!(
            "Retrieved {} chunks from {} (best similarity: {:?})",
            results.len(),
            self.store.name(),
            results.first().map(|r| r.similarity)
        );

        Ok(results.into_iter().map(|r| r.document).collect())
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

// ============================================================================
// RetrievalChain
// ============================================================================

/// 체인 실행 결과
#[derive(Debug, Clone, Serialize)]
pub struct ChainResponse {
    /// 원래 질문
    pub input: String,
    /// 프롬프트에 사용된 청크
    pub context: Vec<Document>,
    /// LLM 답변
    pub answer: String,
}

/// 검색 + 생성 체인
pub struct RetrievalChain {
    retriever: Retriever,
    llm: Arc<dyn LanguageModel>,
    prompt: PromptTemplate,
}

impl RetrievalChain {
    pub fn new(retriever: Retriever, llm: Arc<dyn LanguageModel>, prompt: PromptTemplate) -> Self {
        Self {
            retriever,
            llm,
            prompt,
        }
    }

    /// 질문 하나를 처리
    pub async fn invoke(&self, input: &str) -> Result<ChainResponse> {
        let context = self.retriever.retrieve(input).await?;

        let context_text = stuff_documents(&context);
        let prompt = self
            .prompt
            .format(&[("context", context_text.as_str()), ("input", input)])?;

        let answer = self
            .llm
            .generate(&prompt)
            .await
            .with_context(|| format!("{} failed to generate an answer", self.llm.name()))?;

        Ok(ChainResponse {
            input: input.to_string(),
            context,
            answer,
        })
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn llm_name(&self) -> &str {
        self.llm.name()
    }
}

/// 검색 체인 조립 (의료 프롬프트 사용)
pub fn setup_retrieval_chain(
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    k: usize,
) -> RetrievalChain {
    RetrievalChain::new(
        Retriever::new(embedder, store, k),
        llm,
        create_medical_prompt(),
    )
}

/// 청크 본문을 하나의 컨텍스트 문자열로 결합
pub fn stuff_documents(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.page_content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

// ============================================================================
// Answer Helpers
// ============================================================================

/// 답변 표시용 정리 (앞뒤 공백 제거)
pub fn format_medical_answer(answer: &str) -> String {
    answer.trim().to_string()
}

/// 응답에 사용된 출처 목록 (처음 등장 순서, 중복 제거)
pub fn get_sources_from_response(response: &ChainResponse) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for doc in &response.context {
        let label = doc.source_label();
        if !sources.contains(&label) {
            sources.push(label);
        }
    }
    sources
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::MemoryVectorStore;
    use crate::rag::setup::setup_vector_store;
    use crate::rag::testing::{EchoLlm, FailingLlm, KeywordEmbedder};

    async fn build_chain(llm: Arc<dyn LanguageModel>, k: usize) -> RetrievalChain {
        let embedder = Arc::new(KeywordEmbedder);
        let store = Arc::new(MemoryVectorStore::new());
        let docs = vec![
            Document::new("Anemia is a lack of red blood cells.", "gale.pdf", Some(10)),
            Document::new("Asthma narrows the airways of the lungs.", "gale.pdf", Some(11)),
            Document::new("Acne is a skin condition of the face.", "gale.pdf", Some(3)),
        ];
        setup_vector_store(&docs, embedder.as_ref(), store.as_ref())
            .await
            .unwrap();
        setup_retrieval_chain(store, embedder, llm, k)
    }

    #[tokio::test]
    async fn test_invoke_retrieves_relevant_context() {
        let chain = build_chain(Arc::new(EchoLlm), 1).await;

        let response = chain.invoke("What are red blood cells?").await.unwrap();

        assert_eq!(response.input, "What are red blood cells?");
        assert_eq!(response.context.len(), 1);
        assert_eq!(response.context[0].metadata.page, Some(10));
        // EchoLlm은 프롬프트를 그대로 돌려줌
        assert!(response
            .answer
            .contains("<context>\nAnemia is a lack of red blood cells.\n</context>"));
        assert!(response.answer.contains("Question: What are red blood cells?"));
    }

    #[tokio::test]
    async fn test_invoke_stuffs_top_k_documents() {
        let chain = build_chain(Arc::new(EchoLlm), 4).await;
        let response = chain.invoke("lungs airways").await.unwrap();

        // 문서가 3개뿐이므로 모두 포함
        assert_eq!(response.context.len(), 3);
        assert_eq!(response.context[0].metadata.page, Some(11));
        assert_eq!(chain.retriever().k(), 4);
    }

    #[tokio::test]
    async fn test_invoke_propagates_llm_error() {
        let chain = build_chain(Arc::new(FailingLlm), 2).await;
        let err = chain.invoke("anemia").await.unwrap_err();
        assert!(format!("{:#}", err).contains("model not loaded"));
    }

    #[test]
    fn test_stuff_documents() {
        let docs = vec![
            Document::new("first", "a.pdf", Some(1)),
            Document::new("second", "a.pdf", Some(2)),
        ];
        assert_eq!(stuff_documents(&docs), "first\n\nsecond");
        assert_eq!(stuff_documents(&[]), "");
    }

    #[test]
    fn test_format_medical_answer() {
        assert_eq!(format_medical_answer("\n  **Fever** is...  \n"), "**Fever** is...");
    }

    #[test]
    fn test_get_sources_deduplicates_in_order() {
        let response = ChainResponse {
            input: "q".to_string(),
            context: vec![
                Document::new("a", "gale.pdf", Some(5)),
                Document::new("b", "gale.pdf", Some(2)),
                Document::new("c", "gale.pdf", Some(5)),
                Document::new("d", "notes.txt", None),
            ],
            answer: String::new(),
        };

        assert_eq!(
            get_sources_from_response(&response),
            vec!["gale.pdf (p. 5)", "gale.pdf (p. 2)", "notes.txt"]
        );
    }
}
