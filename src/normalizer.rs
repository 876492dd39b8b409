// 🧹 Name Normalizer - reduce a typed organization name to its identity
//
// Stages:
// 1. strip whitespace
// 2. pre-trim: cut right after the first organizational keyword (公司 / 银行 ...)
// 3. branch test: does this still look like a sub-office?
// 4. mid-trim: scan segmented tokens tail → head, cut before region names
// 5. post-trim (optional): priority short-codes, then exclusion keywords
//
// "平安北京分公司" → "平安"

use crate::config::{compile_pattern, MatchConfig};
use crate::error::Result;
use crate::segmenter::Segmenter;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

struct PostTrim {
    extraction_priority: Vec<String>,
    exclusion_keywords: Vec<String>,
    full_name: Regex,
}

pub struct NameNormalizer {
    organization_keywords: Vec<String>,
    branch_marker: Regex,
    region_names: HashSet<String>,
    region_level_suffixes: Vec<String>,
    post_trim: Option<PostTrim>,
    segmenter: Arc<dyn Segmenter>,
}

impl NameNormalizer {
    pub fn from_config(config: &MatchConfig, segmenter: Arc<dyn Segmenter>) -> Result<Self> {
        let post_trim = if config.post_trim {
            Some(PostTrim {
                extraction_priority: non_empty(&config.extraction_priority),
                exclusion_keywords: non_empty(&config.exclusion_keywords),
                full_name: compile_pattern("full_name_pattern", &config.full_name_pattern)?,
            })
        } else {
            None
        };

        Ok(NameNormalizer {
            organization_keywords: non_empty(&config.organization_keywords),
            branch_marker: compile_pattern("branch_marker_pattern", &config.branch_marker_pattern)?,
            region_names: config.region_names.iter().cloned().collect(),
            region_level_suffixes: non_empty(&config.region_level_suffixes),
            post_trim,
            segmenter,
        })
    }

    /// Total: never fails, empty in → empty out
    pub fn normalize(&self, raw: &str) -> String {
        let compact: String = raw.split_whitespace().collect();
        let pre = self.pre_trim(&compact);
        let mid = if self.is_branch(&pre) {
            self.mid_trim(&pre)
        } else {
            pre
        };

        let normalized = match &self.post_trim {
            Some(post) => self.apply_post_trim(post, &mid),
            None => mid,
        };

        trace!(raw, normalized = normalized.as_str(), "normalized name");
        normalized
    }

    /// Keep everything up to and including the first keyword (priority order)
    pub fn pre_trim(&self, name: &str) -> String {
        for keyword in &self.organization_keywords {
            if let Some(idx) = name.find(keyword.as_str()) {
                return name[..idx + keyword.len()].to_string();
            }
        }
        name.to_string()
    }

    /// Sub-office test (支 / 分 / 营业部 after a real prefix)
    pub fn is_branch(&self, name: &str) -> bool {
        self.branch_marker.is_match(name)
    }

    /// Cut region qualifiers from the tail until the name stops looking like a
    /// branch. Unchanged when no region token is found.
    pub fn mid_trim(&self, name: &str) -> String {
        let mut current = name.to_string();
        for suffix in &self.region_level_suffixes {
            current = current.replace(suffix.as_str(), "");
        }

        let mut tokens = self.segmenter.segment(&current);
        if tokens.len() <= 1 {
            return name.to_string();
        }
        tokens.reverse();

        // The head token (last after reversal) is never a cut point
        let last = tokens.len() - 1;
        let mut trimmed = false;
        let mut idx = 0;

        while idx < last {
            let Some(region) = self.region_word(&tokens[idx]) else {
                idx += 1;
                continue;
            };

            // Extend over adjacent region tokens towards the head: 广东深圳 → 广东
            let mut cut_word = region;
            let mut run_end = idx;
            while run_end + 1 < last {
                match self.region_word(&tokens[run_end + 1]) {
                    Some(word) => {
                        cut_word = word;
                        run_end += 1;
                    }
                    None => break,
                }
            }

            if let Some(cut) = current.rfind(cut_word.as_str()).filter(|&c| c > 0) {
                current.truncate(cut);
                trimmed = true;
                if !self.is_branch(&current) {
                    return current;
                }
            }
            idx = run_end + 1;
        }

        if trimmed {
            current
        } else {
            name.to_string()
        }
    }

    /// Extraction-priority variant of the final stage
    pub fn post_trim(&self, name: &str) -> String {
        match &self.post_trim {
            Some(post) => self.apply_post_trim(post, name),
            None => name.to_string(),
        }
    }

    fn apply_post_trim(&self, post: &PostTrim, name: &str) -> String {
        if let Some(keyword) = post
            .extraction_priority
            .iter()
            .find(|k| name.contains(k.as_str()))
        {
            return keyword.clone();
        }

        if !post.full_name.is_match(name) || self.is_branch(name) {
            if let Some(cut) = post
                .exclusion_keywords
                .iter()
                .filter_map(|k| name.find(k.as_str()))
                .filter(|&c| c > 0)
                .min()
            {
                return name[..cut].to_string();
            }
        }

        name.to_string()
    }

    /// The region a token names, directly or through a finer split
    fn region_word(&self, token: &str) -> Option<String> {
        if self.region_names.contains(token) {
            return Some(token.to_string());
        }
        self.segmenter
            .segment_fine(token)
            .into_iter()
            .rev()
            .find(|sub| self.region_names.contains(sub))
    }
}

fn non_empty(items: &[String]) -> Vec<String> {
    items.iter().filter(|s| !s.is_empty()).cloned().collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::{JiebaSegmenter, LexiconSegmenter};

    fn normalizer_with(config: &MatchConfig) -> NameNormalizer {
        NameNormalizer::from_config(config, Arc::new(LexiconSegmenter::from_config(config))).unwrap()
    }

    fn normalizer() -> NameNormalizer {
        normalizer_with(&MatchConfig::default())
    }

    #[test]
    fn test_strips_whitespace() {
        assert_eq!(normalizer().normalize(" 中国 人寿\t保险 "), "中国人寿保险");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalizer().normalize(""), "");
        assert_eq!(normalizer().normalize("   "), "");
    }

    #[test]
    fn test_pre_trim_keeps_first_company() {
        let n = normalizer();
        assert_eq!(
            n.normalize("ABC财产保险代理有限公司北京分公司"),
            "ABC财产保险代理有限公司"
        );
        assert_eq!(n.pre_trim("中国工商银行北京分行营业部"), "中国工商银行");
    }

    #[test]
    fn test_pre_trim_priority_order() {
        // 公司 outranks 银行 even though 银行 comes first in the text
        assert_eq!(normalizer().pre_trim("某某银行理财子公司北京"), "某某银行理财子公司");
    }

    #[test]
    fn test_branch_test() {
        let n = normalizer();
        assert!(n.is_branch("平安北京分公司"));
        assert!(n.is_branch("太平洋保险上海营业部"));
        assert!(!n.is_branch("平安"));
        // Too short a prefix to be a sub-office
        assert!(!n.is_branch("分公司"));
    }

    #[test]
    fn test_mid_trim_region() {
        assert_eq!(normalizer().normalize("平安北京分公司"), "平安");
    }

    #[test]
    fn test_mid_trim_with_jieba_dictionary() {
        let config = MatchConfig::default();
        let n = NameNormalizer::from_config(&config, Arc::new(JiebaSegmenter::from_config(&config))).unwrap();
        assert_eq!(n.normalize("平安北京分公司"), "平安");
    }

    #[test]
    fn test_mid_trim_drops_level_suffix_and_region_run() {
        assert_eq!(normalizer().normalize("泰康广东省深圳市分公司"), "泰康");
    }

    #[test]
    fn test_mid_trim_without_region_keeps_name() {
        let n = normalizer();
        assert_eq!(n.mid_trim("泰康人寿保险分公司"), "泰康人寿保险分公司");
    }

    #[test]
    fn test_mid_trim_never_cuts_at_head() {
        // Region at the very front: cutting would leave nothing
        assert_eq!(normalizer().mid_trim("北京分公司"), "北京分公司");
    }

    #[test]
    fn test_idempotent_on_non_branch_names() {
        let n = normalizer();
        for raw in ["ABC保险代理有限公司", "平安北京分公司", "中国工商银行北京分行", "泰康"] {
            let once = n.normalize(raw);
            assert!(!n.is_branch(&once));
            assert_eq!(n.normalize(&once), once, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_post_trim_priority_short_code() {
        let mut config = MatchConfig::default();
        config.post_trim = true;
        let n = normalizer_with(&config);
        assert_eq!(n.normalize("中国工商银行股份有限公司北京分行"), "工商银行");
    }

    #[test]
    fn test_post_trim_exclusion_keyword() {
        let mut config = MatchConfig::default();
        config.post_trim = true;
        let n = normalizer_with(&config);

        // Not a complete legal name → cut at the product qualifier
        assert_eq!(n.normalize("平安财产保险上海营业部"), "平安");

        // Complete legal name, not a branch → untouched
        assert_eq!(n.normalize("ABC财产保险代理有限公司"), "ABC财产保险代理有限公司");
    }

    #[test]
    fn test_post_trim_skips_keyword_at_start() {
        let mut config = MatchConfig::default();
        config.post_trim = true;
        let n = normalizer_with(&config);

        // 客服 leads the name, so 人寿保险 is the cut point
        assert_eq!(n.post_trim("客服泰康人寿保险某某"), "客服泰康");
        assert_eq!(n.post_trim("客服"), "客服");
    }

    #[test]
    fn test_post_trim_disabled_is_identity() {
        assert_eq!(normalizer().post_trim("平安财产保险"), "平安财产保险");
    }
}
