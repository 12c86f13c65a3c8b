//! Knowledge 모듈 - 문서 청크와 벡터 인덱스
//!
//! - Document: PDF 로딩 + 재귀 문자 분할
//! - Vector: 검색 트레이트, 인메모리 플랫 인덱스
//! - LanceDB: 디스크 영속 벡터 인덱스
//! - Store: SQLite 인덱스 매니페스트 (캐시 무효화용)

mod chunker;
mod document;
mod lance;
mod memory;
mod store;
mod vector;

// Re-exports
pub use chunker::{
    default_chunker, recursive_chunker, Chunker, RecursiveCharacterSplitter, SplitterConfig,
    DEFAULT_SEPARATORS,
};
pub use document::{load_and_split_documents, split_documents, Document, DocumentMetadata};
pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;
pub use store::{IndexFingerprint, IndexManifest, KnowledgeStore};
pub use vector::{
    cosine_similarity, distance_to_similarity, l2_distance, SearchResult, VectorEntry, VectorStore,
};
