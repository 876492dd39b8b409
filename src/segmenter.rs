// ✂️ Segmenter - word segmentation is consumed through this trait
//
// `JiebaSegmenter` is the production segmenter: jieba's dictionary plus the
// configured region names and priority keywords. `LexiconSegmenter` is a
// forward-maximum-matching fallback over a small fixed vocabulary, used
// where results must not depend on the dictionary.

use crate::config::MatchConfig;
use jieba_rs::Jieba;
use std::collections::HashSet;

pub trait Segmenter: Send + Sync {
    /// Split text into ordered word tokens. Concatenating the tokens must give
    /// back the input.
    fn segment(&self, text: &str) -> Vec<String>;

    /// Finer split of a single token (search-mode segmentation). Returns an
    /// empty list when the token has no smaller known words.
    fn segment_fine(&self, _token: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Vocabulary shared by every organization name in the registry
const BASE_VOCABULARY: &[&str] = &[
    "有限公司", "有限责任公司", "有限", "责任", "股份", "公司", "集团", "分公司", "支公司",
    "营业部", "营业所", "办事处", "中心", "客服", "客服部", "客服处", "银行", "分行", "支行",
    "保险", "财产", "人寿", "健康", "养老", "相互", "再保险", "代理", "经纪", "公估", "销售",
    "服务", "中国", "中华", "联合", "国际", "控股",
];

pub struct LexiconSegmenter {
    words: HashSet<String>,
    max_word_chars: usize,
}

impl LexiconSegmenter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: HashSet<String> = words
            .into_iter()
            .map(Into::into)
            .filter(|w: &String| !w.is_empty())
            .collect();
        let max_word_chars = words.iter().map(|w| w.chars().count()).max().unwrap_or(1);

        LexiconSegmenter { words, max_word_chars }
    }

    /// Base vocabulary plus the configured region names and priority keywords
    pub fn from_config(config: &MatchConfig) -> Self {
        let words = BASE_VOCABULARY
            .iter()
            .map(|w| w.to_string())
            .chain(config.region_names.iter().cloned())
            .chain(config.extraction_priority.iter().cloned());
        LexiconSegmenter::new(words)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    /// Forward maximum matching, words capped at `limit` chars.
    /// ASCII alphanumeric runs stay together as one token.
    fn segment_with_limit(&self, text: &str, limit: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            if chars[i].is_ascii_alphanumeric() {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
                continue;
            }

            let longest = limit.min(chars.len() - i).max(1);
            let mut taken = 1;
            for len in (2..=longest).rev() {
                let candidate: String = chars[i..i + len].iter().collect();
                if self.words.contains(&candidate) {
                    taken = len;
                    break;
                }
            }
            tokens.push(chars[i..i + taken].iter().collect());
            i += taken;
        }

        tokens
    }
}

impl Segmenter for LexiconSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        self.segment_with_limit(text, self.max_word_chars)
    }

    fn segment_fine(&self, token: &str) -> Vec<String> {
        let len = token.chars().count();
        if len < 3 {
            return Vec::new();
        }
        self.segment_with_limit(token, len - 1)
            .into_iter()
            .filter(|t| t.chars().count() > 1 && self.words.contains(t))
            .collect()
    }
}

impl Default for LexiconSegmenter {
    fn default() -> Self {
        Self::from_config(&MatchConfig::default())
    }
}

// ============================================================================
// JIEBA
// ============================================================================

pub struct JiebaSegmenter {
    jieba: Jieba,
}

impl JiebaSegmenter {
    /// Default jieba dictionary plus region names and priority keywords, so
    /// they are never split or merged with their neighbours
    pub fn from_config(config: &MatchConfig) -> Self {
        let mut jieba = Jieba::new();
        for word in config.region_names.iter().chain(config.extraction_priority.iter()) {
            if !word.is_empty() {
                jieba.add_word(word, None, None);
            }
        }
        JiebaSegmenter { jieba }
    }
}

impl Segmenter for JiebaSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        self.jieba
            .cut(text, false)
            .into_iter()
            .map(|t| t.to_string())
            .collect()
    }

    fn segment_fine(&self, token: &str) -> Vec<String> {
        self.jieba
            .cut_for_search(token, false)
            .into_iter()
            .filter(|t| *t != token && t.chars().count() > 1)
            .map(|t| t.to_string())
            .collect()
    }
}

impl Default for JiebaSegmenter {
    fn default() -> Self {
        Self::from_config(&MatchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_organization_name() {
        let seg = LexiconSegmenter::default();
        assert_eq!(
            seg.segment("ABC财产保险代理有限公司"),
            vec!["ABC", "财产", "保险", "代理", "有限公司"]
        );
    }

    #[test]
    fn test_segment_keeps_unknown_chars_single() {
        let seg = LexiconSegmenter::default();
        assert_eq!(seg.segment("平安北京分公司"), vec!["平", "安", "北京", "分公司"]);
    }

    #[test]
    fn test_segment_round_trips_text() {
        let seg = LexiconSegmenter::default();
        let text = "中国人寿保险股份有限公司广东深圳分公司";
        assert_eq!(seg.segment(text).concat(), text);
    }

    #[test]
    fn test_segment_empty() {
        let seg = LexiconSegmenter::default();
        assert!(seg.segment("").is_empty());
    }

    #[test]
    fn test_jieba_segment_round_trips_text() {
        let seg = JiebaSegmenter::default();
        let text = "中国人寿保险股份有限公司广东深圳分公司";
        let tokens = seg.segment(text);
        assert!(tokens.len() > 1);
        assert_eq!(tokens.concat(), text);
        assert_eq!(seg.segment("北京"), vec!["北京"]);
        assert!(seg.segment("").is_empty());
    }

    #[test]
    fn test_jieba_segment_fine_returns_inner_words_only() {
        let seg = JiebaSegmenter::default();
        let token = "中国人寿保险股份有限公司";
        for sub in seg.segment_fine(token) {
            assert_ne!(sub, token);
            assert!(sub.chars().count() > 1);
            assert!(token.contains(sub.as_str()));
        }
    }

    #[test]
    fn test_segment_fine_finds_inner_words() {
        let seg = LexiconSegmenter::new(["北京", "北京朝阳", "朝阳"]);
        assert_eq!(seg.segment("北京朝阳"), vec!["北京朝阳"]);
        assert_eq!(seg.segment_fine("北京朝阳"), vec!["北京", "朝阳"]);
        assert!(seg.segment_fine("北京").is_empty());
    }
}
