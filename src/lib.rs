//! medical-rag - 의료 백과사전 기반 RAG 챗봇
//!
//! PDF 의료 백과사전을 청크로 나누어 Ollama로 임베딩하고,
//! 질문과 가까운 청크를 컨텍스트로 삼아 로컬 LLM이 답변합니다.

pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;
pub mod rag;

// Re-exports
pub use chat::{ChatMessage, ChatSession, ChatTurn, Role};
pub use config::{get_data_dir, AppConfig};
pub use embedding::{create_embedder, EmbeddingProvider, OllamaEmbedding};
pub use error::OllamaError;
pub use knowledge::{
    load_and_split_documents, Chunker, Document, DocumentMetadata, IndexManifest,
    KnowledgeStore, LanceVectorStore, MemoryVectorStore, RecursiveCharacterSplitter,
    SearchResult, VectorEntry, VectorStore,
};
pub use llm::{setup_llm, LanguageModel, OllamaLlm};
pub use rag::{
    format_medical_answer, get_sources_from_response, initialize_rag_components,
    setup_retrieval_chain, setup_vector_store, ChainResponse, RagComponents, RetrievalChain,
};
