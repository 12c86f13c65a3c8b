//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! 인메모리 플랫 인덱스(`MemoryVectorStore`)와
//! LanceDB 디스크 인덱스(`LanceVectorStore`)가 이 트레이트를 구현합니다.

use anyhow::Result;
use async_trait::async_trait;

use super::document::Document;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 청크 인덱스 (0-based, 인덱싱 순서)
    pub chunk_index: i32,
    /// 청크 문서
    pub document: Document,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// 청크 인덱스
    pub chunk_index: i32,
    /// 청크 문서
    pub document: Document,
    /// L2 거리 (작을수록 가까움)
    pub distance: f32,
    /// 유사도 스코어 `1 / (1 + distance)` (0.0 ~ 1.0)
    pub similarity: f32,
}

impl SearchResult {
    pub fn new(chunk_index: i32, document: Document, distance: f32) -> Self {
        Self {
            chunk_index,
            document,
            distance,
            similarity: distance_to_similarity(distance),
        }
    }
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 벡터 검색 (거리 오름차순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 모든 벡터 삭제
    async fn clear(&self) -> Result<()>;

    /// 저장소 이름 (로그/상태 표시용)
    fn name(&self) -> &'static str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 유클리드(L2) 거리
///
/// 길이가 다르면 `f32::INFINITY`를 반환합니다.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// 코사인 유사도 계산 (-1.0 ~ 1.0)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 거리 → 유사도 변환
#[inline]
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_distance() {
        assert_eq!(l2_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(l2_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert!(l2_distance(&[1.0], &[1.0, 2.0]).is_infinite());
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.0001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.0001);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_similarity_from_distance() {
        let result = SearchResult::new(0, Document::new("x", "gale.pdf", Some(1)), 1.0);
        assert!((result.similarity - 0.5).abs() < f32::EPSILON);
        assert_eq!(distance_to_similarity(0.0), 1.0);
    }
}
