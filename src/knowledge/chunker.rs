//! Text Chunking Module
//!
//! 재귀적 문자 분할기를 제공합니다.
//! 문단 → 줄 → 단어 → 문자 순서로 더 잘게 나누면서
//! 최대 크기 이하의 청크를 만들고, 청크 사이에 오버랩을 둡니다.
//! 길이는 모두 문자(char) 수 기준입니다.

use std::collections::VecDeque;

use anyhow::{bail, Result};

// ============================================================================
// Splitter Configuration
// ============================================================================

/// 기본 구분자 (거친 것 → 세밀한 것)
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// 분할 설정
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 구분자 목록 (앞쪽이 우선)
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self::new(1000, 20)
    }
}

impl SplitterConfig {
    /// 기본 구분자로 생성
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveCharacterSplitter
// ============================================================================

/// 재귀적 문자 분할기
///
/// - 텍스트에 등장하는 첫 번째 구분자로 자름 (`""`는 문자 단위)
/// - 구분자는 다음 조각의 앞에 붙여 보존
/// - `chunk_size` 이상인 조각은 다음 구분자로 재귀 분할
/// - 작은 조각은 `chunk_size`까지 이어 붙이고, 오버랩만큼 뒤쪽 조각을 다음 청크로 넘김
pub struct RecursiveCharacterSplitter {
    config: SplitterConfig,
}

impl RecursiveCharacterSplitter {
    /// 설정으로 생성
    pub fn new(config: SplitterConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if config.chunk_overlap > config.chunk_size {
            bail!(
                "chunk_overlap ({}) must not exceed chunk_size ({})",
                config.chunk_overlap,
                config.chunk_size
            );
        }
        Ok(Self { config })
    }

    /// 크기/오버랩만 지정하여 생성
    pub fn with_size(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::new(SplitterConfig::new(chunk_size, chunk_overlap))
    }

    /// 설정 참조
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // 텍스트에 실제로 등장하는 첫 번째 구분자 선택
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut good_splits: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits, ""));
                good_splits.clear();
            }

            if finer.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, finer));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits, ""));
        }

        final_chunks
    }

    /// 작은 조각들을 최대 크기까지 병합 (오버랩 유지)
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let sep_len = char_len(separator);

        let mut docs = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joined_sep = if current.is_empty() { 0 } else { sep_len };

            if total + len + joined_sep > chunk_size {
                if total > chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current, separator) {
                        docs.push(doc);
                    }

                    // 오버랩 이하가 되고 다음 조각이 들어갈 때까지 앞에서 제거
                    while let Some(&(_, front_len)) = current.front() {
                        let joined_sep = if current.is_empty() { 0 } else { sep_len };
                        let must_shrink =
                            total > overlap || (total + len + joined_sep > chunk_size && total > 0);
                        if !must_shrink {
                            break;
                        }
                        let removed_sep = if current.len() > 1 { sep_len } else { 0 };
                        total = total.saturating_sub(front_len + removed_sep);
                        current.pop_front();
                    }
                }
            }

            current.push_back((split.as_str(), len));
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }

        if let Some(doc) = join_pieces(&current, separator) {
            docs.push(doc);
        }

        docs
    }
}

impl Chunker for RecursiveCharacterSplitter {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut chunks = self.split_recursive(text, &self.config.separators);
        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }

    fn name(&self) -> &'static str {
        "RecursiveCharacterSplitter"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자를 다음 조각 앞에 붙여서 분할 (빈 조각 제거)
///
/// 빈 구분자는 문자 단위 분할입니다.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// 조각 결합 후 trim, 비어 있으면 None
fn join_pieces(pieces: &VecDeque<(&str, usize)>, separator: &str) -> Option<String> {
    let joined = pieces
        .iter()
        .map(|(p, _)| *p)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성 (1000자 / 오버랩 20자)
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveCharacterSplitter {
        config: SplitterConfig::default(),
    })
}

/// 크기 지정 청커 생성
pub fn recursive_chunker(chunk_size: usize, chunk_overlap: usize) -> Result<Box<dyn Chunker>> {
    Ok(Box::new(RecursiveCharacterSplitter::with_size(
        chunk_size,
        chunk_overlap,
    )?))
}

// ============================================================================
// Tests
// ============================================================================
