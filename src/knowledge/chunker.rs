//! Text Chunking Module
//!
//! 추출된 문서를 길이 제한이 있는 패시지로 나눕니다.
//! 큰 구분자(문단)부터 작은 구분자(줄, 공백, 문자) 순으로 재귀 분할한 뒤,
//! 조각들을 최대 길이 안에서 다시 이어붙이고 연속된 패시지끼리
//! `overlap_characters` 이내의 꼬리를 공유하게 합니다.
//!
//! 길이는 모두 문자(char) 수 기준입니다.

use std::collections::VecDeque;

use anyhow::Result;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 패시지 최대 길이 (문자 수)
    pub max_characters: usize,
    /// 연속 패시지 간 오버랩 (문자 수)
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_characters: 1000,
            overlap_characters: 200,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_characters == 0 {
            anyhow::bail!("max_characters must be greater than 0");
        }
        if self.overlap_characters >= self.max_characters {
            anyhow::bail!(
                "overlap ({}) must be smaller than max_characters ({})",
                self.overlap_characters,
                self.max_characters
            );
        }
        Ok(())
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
// RecursiveSplitter
// ============================================================================

/// 구분자 우선순위: 문단 > 줄 > 단어 > 문자
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// 재귀 문자 분할기
pub struct RecursiveSplitter {
    config: ChunkConfig,
    separators: Vec<&'static str>,
}

impl RecursiveSplitter {
    /// 설정으로 생성 (오버랩이 최대 길이 이상이면 에러)
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.to_vec(),
        })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    fn split_recursive(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        let max = self.config.max_characters;

        // 텍스트에 등장하는 첫 구분자 선택 ("" 는 항상 매칭)
        let mut separator = separators.last().copied().unwrap_or("");
        let mut rest: &[&'static str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                separator = sep;
                rest = &separators[i + 1..];
                break;
            }
        }

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for split in splits {
            if char_len(split) <= max {
                fitting.push(split);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge_splits(&fitting, separator));
                fitting.clear();
            }

            if rest.is_empty() {
                chunks.push(split.to_string());
            } else {
                chunks.extend(self.split_recursive(split, rest));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_splits(&fitting, separator));
        }

        chunks
    }

    /// 최대 길이 이하의 조각들을 이어붙여 패시지 생성
    ///
    /// 각 조각은 `max_characters` 이하여야 합니다.
    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let max = self.config.max_characters;
        let overlap = self.config.overlap_characters;
        let sep_len = char_len(separator);

        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &split in splits {
            let len = char_len(split);
            let joint = if current.is_empty() { 0 } else { sep_len };

            if total + len + joint > max && !current.is_empty() {
                if let Some(doc) = join_trimmed(&current, separator) {
                    docs.push(doc);
                }

                // 오버랩 이하가 될 때까지, 그리고 다음 조각이 들어갈 때까지 앞에서 제거
                loop {
                    let joint = if current.is_empty() { 0 } else { sep_len };
                    let too_long = total > 0 && total + len + joint > max;
                    if total <= overlap && !too_long {
                        break;
                    }
                    let Some(first) = current.front() else {
                        break;
                    };
                    let trailing = if current.len() > 1 { sep_len } else { 0 };
                    let removed = char_len(first) + trailing;
                    current.pop_front();
                    total = total.saturating_sub(removed);
                }
            }

            if !current.is_empty() {
                total += sep_len;
            }
            current.push_back(split);
            total += len;
        }

        if let Some(doc) = join_trimmed(&current, separator) {
            docs.push(doc);
        }

        docs
    }
}

impl Chunker for RecursiveSplitter {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        self.split_recursive(text, &self.separators)
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect()
    }

    fn name(&self) -> &'static str {
        "RecursiveSplitter"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_trimmed(parts: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 기본 청커 생성 (1000자 / 오버랩 200자)
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveSplitter {
        config: ChunkConfig::default(),
        separators: DEFAULT_SEPARATORS.to_vec(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(max: usize, overlap: usize) -> RecursiveSplitter {
        RecursiveSplitter::new(ChunkConfig {
            max_characters: max,
            overlap_characters: overlap,
        })
        .unwrap()
    }

    #[test]
    fn test_empty_text() {
        assert!(splitter(100, 10).chunk("").is_empty());
        assert!(splitter(100, 10).chunk("  \n\n ").is_empty());
    }

    #[test]
    fn test_short_text_single_passage() {
        let chunks = splitter(100, 10).chunk("  Apply by March 1.  ");
        assert_eq!(chunks, vec!["Apply by March 1.".to_string()]);
    }

    #[test]
    fn test_word_overlap() {
        let chunks = splitter(10, 5).chunk("aaaa bbbb cccc dddd eeee");
        assert_eq!(
            chunks,
            vec!["aaaa bbbb", "bbbb cccc", "cccc dddd", "dddd eeee"]
        );
    }

    #[test]
    fn test_no_overlap() {
        let chunks = splitter(10, 0).chunk("aaaa bbbb cccc dddd");
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc dddd"]);
    }

    #[test]
    fn test_passages_are_bounded() {
        let paragraph = "Penn State Great Valley offers graduate programs in engineering, \
                         business and data analytics with flexible evening classes. ";
        let text = format!(
            "{}\n\n{}\n{}\n\n{}",
            paragraph.repeat(5),
            paragraph.repeat(2),
            "x".repeat(450),
            paragraph
        );

        let s = splitter(120, 30);
        let chunks = s.chunk(&text);
        assert!(chunks.len() > 5);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 120, "too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_unbroken_text_split_by_characters() {
        let chunks = splitter(10, 2).chunk(&"y".repeat(25));
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks[0], "y".repeat(10));
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "대학원 입학 안내 ".repeat(20);
        let chunks = splitter(30, 5).chunk(&text);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = splitter(25, 0).chunk(text);
        assert_eq!(chunks, vec!["First paragraph here.", "Second paragraph here."]);
    }

    #[test]
    fn test_invalid_config() {
        assert!(RecursiveSplitter::new(ChunkConfig {
            max_characters: 10,
            overlap_characters: 10
        })
        .is_err());
        assert!(RecursiveSplitter::new(ChunkConfig {
            max_characters: 0,
            overlap_characters: 0
        })
        .is_err());
    }

    #[test]
    fn test_default_chunker() {
        let chunker = default_chunker();
        assert_eq!(chunker.name(), "RecursiveSplitter");
        assert_eq!(ChunkConfig::default().max_characters, 1000);
        assert_eq!(ChunkConfig::default().overlap_characters, 200);
    }
}
