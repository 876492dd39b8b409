// 🔍 Similarity Matcher - longest-matching-blocks ratio over names
//
// ratio = 2·M / (|a| + |b|), M = total size of the matching blocks found by
// repeatedly taking the longest common contiguous block and recursing on
// both sides. Short names compare as characters, long names as word tokens.

use crate::index::NameMap;
use crate::segmenter::Segmenter;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Abbreviations: raw character sequences
    Characters,

    /// Full names: segmented word sequences
    Tokens,
}

pub struct SimilarityMatcher {
    abbreviation_length_threshold: usize,
    segmenter: Arc<dyn Segmenter>,
}

impl SimilarityMatcher {
    pub fn new(abbreviation_length_threshold: usize, segmenter: Arc<dyn Segmenter>) -> Self {
        SimilarityMatcher {
            abbreviation_length_threshold,
            segmenter,
        }
    }

    /// Names shorter than the threshold are treated as abbreviations
    pub fn is_abbreviation(&self, name: &str) -> bool {
        name.chars().count() < self.abbreviation_length_threshold
    }

    pub fn mode_for(&self, name: &str) -> CompareMode {
        if self.is_abbreviation(name) {
            CompareMode::Characters
        } else {
            CompareMode::Tokens
        }
    }

    pub fn score(&self, a: &str, b: &str, mode: CompareMode) -> f64 {
        match mode {
            CompareMode::Characters => {
                let a: Vec<char> = a.chars().collect();
                let b: Vec<char> = b.chars().collect();
                sequence_ratio(&a, &b)
            }
            CompareMode::Tokens => {
                let a = self.segmenter.segment(a);
                let b = self.segmenter.segment(b);
                sequence_ratio(&a, &b)
            }
        }
    }

    /// Best candidate in the pool. Strict `>`: the first-seen candidate keeps
    /// a tie. Empty pool → (0.0, None).
    pub fn best_match<'p>(&self, name: &str, pool: &'p NameMap) -> (f64, Option<&'p str>) {
        let mode = self.mode_for(name);
        let name_tokens = match mode {
            CompareMode::Tokens => Some(self.segmenter.segment(name)),
            CompareMode::Characters => None,
        };
        let name_chars: Vec<char> = name.chars().collect();

        let mut best_score = 0.0;
        let mut best_key = None;

        for candidate in pool.keys() {
            let score = match &name_tokens {
                Some(tokens) => sequence_ratio(tokens, &self.segmenter.segment(candidate)),
                None => {
                    let candidate_chars: Vec<char> = candidate.chars().collect();
                    sequence_ratio(&name_chars, &candidate_chars)
                }
            };
            if score > best_score {
                best_score = score;
                best_key = Some(candidate);
            }
        }

        (best_score, best_key)
    }
}

// ============================================================================
// RATIO
// ============================================================================

/// Symmetric similarity in [0, 1]. Both empty → 1.0.
///
/// Block discovery depends on argument order when several longest blocks
/// tie, so the pair is put in a canonical order first.
pub fn sequence_ratio<T: Eq + Hash + Ord>(a: &[T], b: &[T]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let (first, second) = if (a.len(), a) <= (b.len(), b) { (a, b) } else { (b, a) };
    2.0 * matching_size(first, second) as f64 / total as f64
}

/// Total size of the matching blocks of `a` against `b`
fn matching_size<T: Eq + Hash>(a: &[T], b: &[T]) -> usize {
    let mut b2j: HashMap<&T, Vec<usize>> = HashMap::new();
    for (j, item) in b.iter().enumerate() {
        b2j.entry(item).or_default().push(j);
    }

    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }
    total
}

/// Longest block a[i..i+k] == b[j..j+k] inside the given ranges; earliest in
/// `a`, then earliest in `b`, wins ties
fn longest_match<T: Eq + Hash>(
    a: &[T],
    b2j: &HashMap<&T, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        let mut next_j2len = HashMap::new();
        if let Some(positions) = b2j.get(&a[i]) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next_j2len.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = next_j2len;
    }

    (best_i, best_j, best_size)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Bucket, ReferenceEntry};
    use crate::index::IndexEntry;
    use crate::segmenter::LexiconSegmenter;

    fn matcher() -> SimilarityMatcher {
        SimilarityMatcher::new(12, Arc::new(LexiconSegmenter::default()))
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn pool(names: &[&str]) -> NameMap {
        let mut map = NameMap::default();
        for name in names {
            map.insert(
                name,
                IndexEntry::Terminal(ReferenceEntry {
                    full_name: name.to_string(),
                    business_type: String::new(),
                    bucket: Bucket::Other,
                }),
            );
        }
        map
    }

    #[test]
    fn test_ratio_known_values() {
        // "bcd" matches: 2·3 / (4 + 4)
        assert_eq!(sequence_ratio(&chars("abcd"), &chars("bcda")), 0.75);
        assert_eq!(sequence_ratio(&chars("abc"), &chars("xyz")), 0.0);
        assert_eq!(sequence_ratio::<char>(&[], &[]), 1.0);
        assert_eq!(sequence_ratio(&chars(""), &chars("abc")), 0.0);
    }

    #[test]
    fn test_ratio_identity_and_symmetry() {
        let names = ["ABC保险代理", "ABC代理", "平安财产保险", "泰康人寿", "abab", "baba"];
        for a in names {
            assert_eq!(sequence_ratio(&chars(a), &chars(a)), 1.0);
            for b in names {
                assert_eq!(
                    sequence_ratio(&chars(a), &chars(b)),
                    sequence_ratio(&chars(b), &chars(a)),
                    "asymmetric for {} / {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_ratio_bounded() {
        let r = sequence_ratio(&chars("平安人寿"), &chars("平安财产保险"));
        assert!((0.0..=1.0).contains(&r));
        assert!((r - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_mode_by_length() {
        let m = matcher();
        assert_eq!(m.mode_for("ABC代理"), CompareMode::Characters);
        assert_eq!(m.mode_for("ABC财产保险代理有限公司"), CompareMode::Tokens);
    }

    #[test]
    fn test_token_score() {
        let m = matcher();
        let score = m.score("ABC财产保险代理有限公司", "ABC保险代理有限公司", CompareMode::Tokens);
        // [ABC 财产 保险 代理 有限公司] vs [ABC 保险 代理 有限公司]: 4 blocks of 9
        assert!((score - 8.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_token_score_symmetric() {
        let m = matcher();
        let names = [
            "ABC财产保险代理有限公司",
            "ABC保险代理有限公司",
            "中国人寿保险股份有限公司广东深圳分公司",
            "泰康人寿保险有限责任公司",
            "有限公司保险代理ABC",
        ];
        for a in names {
            assert_eq!(m.score(a, a, CompareMode::Tokens), 1.0);
            for b in names {
                let ab = m.score(a, b, CompareMode::Tokens);
                let ba = m.score(b, a, CompareMode::Tokens);
                assert_eq!(ab, ba, "asymmetric for {} / {}", a, b);
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn test_best_match_score_symmetric_in_token_mode() {
        let m = matcher();
        let a = "ABC财产保险代理有限公司";
        let b = "ABC保险代理有限公司北京";
        let pool_b = pool(&[b]);
        let pool_a = pool(&[a]);
        let (forward, _) = m.best_match(a, &pool_b);
        let (backward, _) = m.best_match(b, &pool_a);
        assert_eq!(m.mode_for(a), CompareMode::Tokens);
        assert_eq!(m.mode_for(b), CompareMode::Tokens);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_best_match_picks_highest() {
        let m = matcher();
        let p = pool(&["泰康人寿", "平安产险", "平安人寿"]);
        let (score, key) = m.best_match("平安人寿", &p);
        assert_eq!(score, 1.0);
        assert_eq!(key, Some("平安人寿"));
    }

    #[test]
    fn test_best_match_tie_keeps_first_seen() {
        let m = matcher();
        let p = pool(&["平安甲", "平安乙"]);
        let (score, key) = m.best_match("平安丙", &p);
        assert!(score > 0.0);
        assert_eq!(key, Some("平安甲"));
    }

    #[test]
    fn test_best_match_empty_pool() {
        let empty = NameMap::default();
        let (score, key) = matcher().best_match("平安", &empty);
        assert_eq!(score, 0.0);
        assert_eq!(key, None);
    }

    #[test]
    fn test_best_match_empty_name() {
        let p = pool(&["平安"]);
        let (score, key) = matcher().best_match("", &p);
        assert_eq!(score, 0.0);
        assert_eq!(key, None);
    }
}
