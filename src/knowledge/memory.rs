//! 인메모리 벡터 저장소
//!
//! 모든 벡터와 L2 거리를 전수 비교하는 플랫 인덱스입니다.
//! 청크 수가 수십~수천 개 수준이라 ANN 없이도 충분합니다.

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::vector::{l2_distance, SearchResult, VectorEntry, VectorStore};

/// 인메모리 플랫 L2 인덱스
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    entries: RwLock<Vec<VectorEntry>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 벡터 차원 (비어 있으면 None)
    pub async fn dimension(&self) -> Option<usize> {
        self.entries.read().await.first().map(|e| e.embedding.len())
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut stored = self.entries.write().await;

        // 첫 엔트리의 차원에 모두 맞아야 함
        let dimension = stored
            .first()
            .map(|e| e.embedding.len())
            .unwrap_or(entries[0].embedding.len());

        if dimension == 0 {
            bail!("Cannot index empty embeddings");
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
            bail!(
                "Embedding dimension mismatch: expected {}, got {} (chunk {})",
                dimension,
                bad.embedding.len(),
                bad.chunk_index
            );
        }

        stored.extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let stored = self.entries.read().await;
        if stored.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        if stored[0].embedding.len() != query_embedding.len() {
            bail!(
                "Query dimension {} does not match index dimension {}",
                query_embedding.len(),
                stored[0].embedding.len()
            );
        }

        let mut scored: Vec<(f32, &VectorEntry)> = stored
            .iter()
            .map(|e| (l2_distance(query_embedding, &e.embedding), e))
            .collect();

        // 거리가 같으면 삽입 순서 유지 (stable sort)
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(distance, e)| SearchResult::new(e.chunk_index, e.document.clone(), distance))
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
