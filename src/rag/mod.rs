//! RAG 모듈 - 검색 증강 생성 체인
//!
//! - Prompt: 의료 질문 프롬프트 템플릿
//! - Chain: Retriever + Prompt + LLM
//! - Setup: 인덱스 구축/재사용, 체인 1회 초기화

mod chain;
mod prompt;
mod setup;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{
    format_medical_answer, get_sources_from_response, setup_retrieval_chain, stuff_documents,
    ChainResponse, RetrievalChain, Retriever, DEFAULT_TOP_K,
};
pub use prompt::{create_medical_prompt, PromptTemplate, NO_CONTEXT_ANSWER};
pub use setup::{
    build_or_load_index, initialize_rag_components, load_index_documents, setup_vector_store,
    IndexStatus, RagComponents,
};
