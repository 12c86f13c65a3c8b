//! RAG 구성요소 초기화
//!
//! 로드 → 분할 → 임베딩 → 인덱싱 → LLM 연결 → 체인 조립.
//! 임베딩이 가장 비싸므로 두 단계로 캐시합니다.
//! - 디스크: LanceDB 인덱스 + SQLite 매니페스트 (지문이 같으면 재사용)
//! - 프로세스: `RagComponents`가 체인을 한 번만 생성

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::OnceCell;

use crate::config::AppConfig;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::knowledge::{
    load_and_split_documents, Document, IndexFingerprint, IndexManifest, KnowledgeStore,
    LanceVectorStore, MemoryVectorStore, VectorEntry, VectorStore,
};
use crate::llm::setup_llm;

use super::chain::{setup_retrieval_chain, RetrievalChain};

// ============================================================================
// Vector Store Setup
// ============================================================================

/// 문서를 임베딩하여 벡터 저장소에 삽입
///
/// 문서 순서가 청크 인덱스가 됩니다.
pub async fn setup_vector_store(
    documents: &[Document],
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
) -> Result<usize> {
    if documents.is_empty() {
        bail!("No documents to index");
    }

    let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
    let embeddings = embedder
        .embed_batch(&texts)
        .await
        .with_context(|| format!("Error setting up vector store ({})", embedder.name()))?;

    let entries: Vec<VectorEntry> = documents
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (document, embedding))| VectorEntry {
            chunk_index: i as i32,
            document: document.clone(),
            embedding,
        })
        .collect();

    let inserted = store
        .insert_batch(&entries)
        .await
        .context("Failed to insert vectors")?;

    tracing::info!("Indexed {} chunks into {} store", inserted, store.name());
    Ok(inserted)
}

/// 인덱싱 대상 문서 로드 (`max_chunks`개까지만)
pub async fn load_index_documents(config: &AppConfig) -> Result<Vec<Document>> {
    let documents =
        load_and_split_documents(&config.pdf_path, config.chunk_size, config.chunk_overlap).await?;
    Ok(truncate_documents(documents, config.max_chunks))
}

fn truncate_documents(mut documents: Vec<Document>, max_chunks: Option<usize>) -> Vec<Document> {
    if let Some(max) = max_chunks {
        if documents.len() > max {
            tracing::info!("Using first {} of {} chunks", max, documents.len());
            documents.truncate(max);
        }
    }
    documents
}

// ============================================================================
// Persistent Index
// ============================================================================

/// 인덱스 준비 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// 기존 인덱스 재사용
    Reused { chunks: usize },
    /// 새로 생성
    Built { chunks: usize },
}

impl IndexStatus {
    pub fn chunks(&self) -> usize {
        match self {
            IndexStatus::Reused { chunks } | IndexStatus::Built { chunks } => *chunks,
        }
    }
}

/// PDF 지문 계산 (큰 파일이므로 blocking 스레드에서)
async fn fingerprint_pdf(path: &Path, config: &AppConfig) -> Result<IndexFingerprint> {
    let path = path.to_path_buf();
    let config = config.clone();
    tokio::task::spawn_blocking(move || IndexFingerprint::from_file(&path, &config))
        .await
        .context("Fingerprint task failed")?
}

/// 디스크 인덱스를 열고, 지문이 다르거나 `force`면 다시 생성
pub async fn build_or_load_index(
    config: &AppConfig,
    embedder: &dyn EmbeddingProvider,
    force: bool,
) -> Result<(LanceVectorStore, IndexStatus)> {
    let fingerprint = fingerprint_pdf(&config.pdf_path, config).await?;
    let manifests = KnowledgeStore::open(&config.manifest_path())
        .context("Failed to open manifest store")?;
    let vectors = LanceVectorStore::open(&config.lance_path())
        .await
        .context("Failed to open vector store")?;

    let status = sync_index(
        config,
        embedder,
        &vectors,
        &manifests,
        &fingerprint,
        force,
        || load_index_documents(config),
    )
    .await?;
    Ok((vectors, status))
}
/// 매니페스트와 벡터 수가 맞으면 재사용, 아니면 `load`로 문서를 읽어 재구축
async fn sync_index<F, Fut>(
    config: &AppConfig,
    embedder: &dyn EmbeddingProvider,
    vectors: &dyn VectorStore,
    manifests: &KnowledgeStore,
    fingerprint: &IndexFingerprint,
    force: bool,
    load: F,
) -> Result<IndexStatus>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<Document>>>,
{
    if !force {
        if let Some(manifest) = manifests.get_manifest(fingerprint)? {
            let count = vectors.count().await?;
            if count == manifest.chunk_count {
                tracing::info!(
                    "Reusing index {} ({} chunks, built {})",
                    fingerprint.short(),
                    count,
                    manifest.created_at.format("%Y-%m-%d %H:%M")
                );
                return Ok(IndexStatus::Reused { chunks: count });
            }
            tracing::warn!(
                "Index {} is incomplete ({} of {} chunks), rebuilding",
                fingerprint.short(),
                count,
                manifest.chunk_count
            );
        }
    }
    let documents = load().await?;
    // 구축 도중 중단되어도 불완전한 인덱스를 신뢰하지 않도록 매니페스트부터 삭제
    manifests.clear()?;
    vectors.clear().await?;
    let chunks = setup_vector_store(&documents, embedder, vectors).await?;
    manifests.record_manifest(&IndexManifest {
        fingerprint: fingerprint.clone(),
        pdf_path: config.pdf_path.display().to_string(),
        chunk_count: chunks,
        embed_model: embedder.name().to_string(),
        created_at: Utc::now(),
    })?;
    Ok(IndexStatus::Built { chunks })
}
// ============================================================================
// Chain Initialization
// ============================================================================
/// 전체 RAG 구성요소 초기화
pub async fn initialize_rag_components(config: &AppConfig) -> Result<RetrievalChain> {
    config.validate()?;
    let embedder = Arc::new(create_embedder(config)?);
    let store: Arc<dyn VectorStore> = if config.use_cache {
        let (vectors, status) = build_or_load_index(config, embedder.as_ref(), false).await?;
        tracing::info!("Vector index ready: {:?}", status);
        Arc::new(vectors)
    } else {
        let memory = MemoryVectorStore::new();
        let documents = load_index_documents(config).await?;
        setup_vector_store(&documents, embedder.as_ref(), &memory).await?;
        Arc::new(memory)
    };
    let llm = Arc::new(setup_llm(config)?);
    Ok(setup_retrieval_chain(store, embedder, llm, config.top_k))
}
/// 프로세스 내 1회 초기화 캐시
///
/// 첫 `chain()` 호출에서 초기화하고, 이후에는 같은 체인을 돌려줍니다.
/// 초기화가 실패하면 다음 호출에서 다시 시도합니다.
pub struct RagComponents {
    config: AppConfig,
    chain: OnceCell<Arc<RetrievalChain>>,
}
impl RagComponents {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            chain: OnceCell::new(),
        }
    }
    /// 미리 만들어 둔 체인으로 생성
    pub fn with_chain(config: AppConfig, chain: RetrievalChain) -> Self {
        Self {
            config,
            chain: OnceCell::new_with(Some(Arc::new(chain))),
        }
    }
    pub async fn chain(&self) -> Result<Arc<RetrievalChain>> {
        self.chain
            .get_or_try_init(|| async {
                initialize_rag_components(&self.config).await.map(Arc::new)
            })
            .await
            .cloned()
    }
    pub fn is_initialized(&self) -> bool {
        self.chain.initialized()
    }
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
