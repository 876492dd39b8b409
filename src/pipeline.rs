// 🔁 Row Pipeline - one raw name in, one terminal outcome out
//
// normalize → exact lookup → bank-like short-circuit → classify → pool →
// similarity → tier → resolve matched key. Faults stop at the row boundary.

use crate::classifier::TypeClassifier;
use crate::config::{compile_pattern, CandidateUniverse, MatchConfig, TierProfile};
use crate::dispatcher::RowProcessor;
use crate::entities::{Bucket, RowOutput, RowRecord, RowStatus, Tier};
use crate::error::{MatchError, Result};
use crate::index::{MapRef, NameKind, ReferenceIndex};
use crate::normalizer::NameNormalizer;
use crate::segmenter::Segmenter;
use crate::similarity::SimilarityMatcher;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub status: RowStatus,
    pub tier: Tier,

    /// The normalized input name
    pub canonical_name: String,

    /// Registry full name, when a registry entry was reached
    pub matched_name: Option<String>,
    pub business_type: String,

    /// Best similarity; empty for exact hits and unknowns
    pub score: Option<f64>,
}

impl MatchResult {
    fn unmatched(canonical_name: String, business_type: &str) -> Self {
        MatchResult {
            status: RowStatus::Nonexistent,
            tier: Tier::Unknown,
            canonical_name,
            matched_name: None,
            business_type: business_type.to_string(),
            score: None,
        }
    }

    pub fn to_output(&self) -> RowOutput {
        RowOutput {
            tier: Some(self.tier),
            canonical_name: Some(self.canonical_name.clone()),
            matched_name: self.matched_name.clone(),
            business_type: Some(self.business_type.clone()),
            similarity: self.score.map(round_score),
            error: None,
        }
    }
}

fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

// ============================================================================
// ROW PIPELINE
// ============================================================================

pub struct RowPipeline {
    index: Arc<ReferenceIndex>,
    normalizer: NameNormalizer,
    classifier: TypeClassifier,
    matcher: SimilarityMatcher,
    profile: TierProfile,
    bank_like: Regex,
    flat_strip_words: Vec<String>,
    name_column: String,
}

impl RowPipeline {
    pub fn new(index: Arc<ReferenceIndex>, config: &MatchConfig, segmenter: Arc<dyn Segmenter>) -> Result<Self> {
        Ok(RowPipeline {
            index,
            normalizer: NameNormalizer::from_config(config, Arc::clone(&segmenter))?,
            classifier: TypeClassifier::from_config(config)?,
            matcher: SimilarityMatcher::new(config.abbreviation_length_threshold, segmenter),
            profile: config.active_profile()?.clone(),
            bank_like: compile_pattern("bank_like_pattern", &config.bank_like_pattern)?,
            flat_strip_words: config
                .flat_strip_words
                .iter()
                .filter(|w| !w.is_empty())
                .cloned()
                .collect(),
            name_column: config.name_column.clone(),
        })
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// Run the match steps for one raw name
    pub fn evaluate(&self, raw: &str) -> Result<MatchResult> {
        let name = self.normalizer.normalize(raw);

        // Exact hit always wins
        if let Some(entry) = self.index.resolve_name(&name)? {
            return Ok(MatchResult {
                status: RowStatus::Existing,
                tier: Tier::Known,
                business_type: entry.type_label().to_string(),
                matched_name: Some(entry.full_name),
                canonical_name: name,
                score: None,
            });
        }

        if self.bank_like.is_match(&name) {
            return Ok(MatchResult::unmatched(name, Bucket::Bank.label()));
        }

        let (type_label, bucket) = self.classifier.classify(&name);
        let (pool, candidate) = match self.profile.universe {
            CandidateUniverse::Bucketed => {
                let kind = if self.matcher.is_abbreviation(&name) {
                    NameKind::Abbreviation
                } else {
                    NameKind::Full
                };
                (MapRef::bucket(bucket, kind), name.clone())
            }
            CandidateUniverse::Flat => (MapRef::global(NameKind::Combined), self.strip_flat_words(&name)),
        };

        let (score, key) = self.matcher.best_match(&candidate, self.index.map(pool));
        let tier = self.profile.tier_for(score);
        debug!(name = name.as_str(), bucket = bucket.key(), score, tier = tier.label(), "scored candidate");

        let key = match key {
            Some(key) if tier != Tier::Unknown => key,
            _ => return Ok(MatchResult::unmatched(name, type_label)),
        };

        let entry = self.index.resolve(pool, key)?.ok_or_else(|| {
            MatchError::Processing(format!("matched key '{}' vanished from its pool", key))
        })?;

        Ok(MatchResult {
            status: RowStatus::SimilarityMatched,
            tier,
            canonical_name: name,
            matched_name: Some(entry.full_name.clone()),
            business_type: entry.type_label().to_string(),
            score: Some(score),
        })
    }

    fn strip_flat_words(&self, name: &str) -> String {
        self.flat_strip_words
            .iter()
            .fold(name.to_string(), |acc, word| acc.replace(word.as_str(), ""))
    }

    fn process_row(&self, row: &mut RowRecord) -> Result<()> {
        let raw = row
            .column_value(&self.name_column)
            .ok_or_else(|| {
                MatchError::Validation(format!(
                    "row {}: missing name column '{}'",
                    row.position, self.name_column
                ))
            })?
            .to_string();

        let result = self.evaluate(&raw)?;
        row.transition(result.status)?;
        row.output = result.to_output();
        Ok(())
    }
}

impl RowProcessor for RowPipeline {
    fn process(&self, row: &mut RowRecord) {
        if let Err(err) = self.process_row(row) {
            if err.is_row_fault() {
                warn!(position = row.position, error = %err, "row failed");
            } else {
                error!(position = row.position, error = %err, "reference index fault while matching row");
            }
            row.fail(&err);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ReferenceRow, SourceRef};
    use crate::segmenter::LexiconSegmenter;

    fn reference_rows() -> Vec<ReferenceRow> {
        vec![
            ReferenceRow::new("ABC保险代理有限公司", "ABC代理", "agency"),
            ReferenceRow::new("中国平安保险（集团）股份有限公司", "平安", "保险公司"),
            ReferenceRow::new("泰康人寿保险有限责任公司", "泰康人寿", "保险公司"),
            ReferenceRow::new("招商银行股份有限公司", "招商银行", "银行"),
        ]
    }

    fn pipeline_with(config: &MatchConfig) -> RowPipeline {
        let index = Arc::new(ReferenceIndex::build(&reference_rows(), config).unwrap());
        RowPipeline::new(index, config, Arc::new(LexiconSegmenter::from_config(config))).unwrap()
    }

    fn pipeline() -> RowPipeline {
        pipeline_with(&MatchConfig::default())
    }

    fn row_with_name(position: usize, name: &str) -> RowRecord {
        RowRecord::new(
            position,
            SourceRef::new("报名表单数据.xlsx", "listing"),
            vec!["序号".to_string(), "公司".to_string()],
            vec![position.to_string(), name.to_string()],
        )
    }

    #[test]
    fn test_branch_of_agency_is_similar() {
        let result = pipeline().evaluate("ABC财产保险代理有限公司北京分公司").unwrap();

        assert_eq!(result.canonical_name, "ABC财产保险代理有限公司");
        assert_eq!(result.status, RowStatus::SimilarityMatched);
        assert_eq!(result.tier, Tier::Similar);
        assert_eq!(result.matched_name.as_deref(), Some("ABC保险代理有限公司"));
        assert_eq!(result.business_type, "agency");

        let score = result.score.unwrap();
        assert!((0.8..0.9).contains(&score), "score {}", score);
    }

    #[test]
    fn test_exact_match_takes_precedence() {
        let p = pipeline();

        let result = p.evaluate("ABC代理").unwrap();
        assert_eq!(result.status, RowStatus::Existing);
        assert_eq!(result.tier, Tier::Known);
        assert_eq!(result.score, None);
        assert_eq!(result.matched_name.as_deref(), Some("ABC保险代理有限公司"));

        // Branch qualifiers are trimmed before the lookup
        let result = p.evaluate("平安北京分公司").unwrap();
        assert_eq!(result.tier, Tier::Known);
        assert_eq!(result.canonical_name, "平安");
        assert_eq!(result.matched_name.as_deref(), Some("中国平安保险（集团）股份有限公司"));
        assert_eq!(result.business_type, "保险公司");
    }

    #[test]
    fn test_bank_like_short_circuits() {
        let result = pipeline().evaluate("某某农商行").unwrap();
        assert_eq!(result.status, RowStatus::Nonexistent);
        assert_eq!(result.tier, Tier::Unknown);
        assert_eq!(result.business_type, "bank");
        assert_eq!(result.score, None);
        assert_eq!(result.matched_name, None);
    }

    #[test]
    fn test_empty_name_is_unknown() {
        let result = pipeline().evaluate("   ").unwrap();
        assert_eq!(result.canonical_name, "");
        assert_eq!(result.status, RowStatus::Nonexistent);
        assert_eq!(result.tier, Tier::Unknown);
        assert_eq!(result.business_type, "related institution");
    }

    #[test]
    fn test_profiles_use_different_universes() {
        // 泰康养老 carries no type keyword: empty bucket pool when bucketed
        let bucketed = pipeline().evaluate("泰康养老北京营业部").unwrap();
        assert_eq!(bucketed.canonical_name, "泰康养老");
        assert_eq!(bucketed.tier, Tier::Unknown);

        // Flat: every registered name is a candidate, 泰康人寿 scores 0.5
        let flat = pipeline_with(&MatchConfig::default().with_profile("flat"))
            .evaluate("泰康养老北京营业部")
            .unwrap();
        assert_eq!(flat.status, RowStatus::SimilarityMatched);
        assert_eq!(flat.tier, Tier::Guessed);
        assert_eq!(flat.matched_name.as_deref(), Some("泰康人寿保险有限责任公司"));
        assert_eq!(flat.score, Some(0.5));
    }

    #[test]
    fn test_process_writes_row_output() {
        let mut row = row_with_name(2, "ABC财产保险代理有限公司北京分公司");
        pipeline().process(&mut row);

        assert_eq!(row.status(), RowStatus::SimilarityMatched);
        assert_eq!(row.output.similarity, Some(0.89));
        assert_eq!(row.output.result_label(), "similar");
        assert_eq!(row.output.business_type.as_deref(), Some("agency"));
        assert_eq!(row.output.error, None);
    }

    #[test]
    fn test_process_missing_name_column_marks_error() {
        let mut row = RowRecord::new(
            3,
            SourceRef::new("报名表单数据.xlsx", "listing"),
            vec!["序号".to_string()],
            vec!["3".to_string()],
        );
        pipeline().process(&mut row);

        assert_eq!(row.status(), RowStatus::Error);
        let cause = row.output.error.unwrap();
        assert!(cause.contains("公司"), "cause: {}", cause);
    }

    #[test]
    fn test_alias_cycle_during_matching_marks_row_error() {
        let config = MatchConfig::default();
        let mut index = ReferenceIndex::build(&reference_rows(), &config).unwrap();
        let combined = MapRef::global(NameKind::Combined);
        let other = MapRef::bucket(Bucket::Other, NameKind::Abbreviation);
        index.insert_alias(combined, "循环单位", other, "循环单位");
        index.insert_alias(other, "循环单位", combined, "循环单位");

        let p = RowPipeline::new(
            Arc::new(index),
            &config,
            Arc::new(LexiconSegmenter::from_config(&config)),
        )
        .unwrap();
        assert!(matches!(
            p.evaluate("循环单位"),
            Err(MatchError::DataIntegrity { .. })
        ));

        let mut row = row_with_name(5, "循环单位");
        p.process(&mut row);
        assert_eq!(row.status(), RowStatus::Error);
        let cause = row.output.error.unwrap();
        assert!(cause.contains("Data integrity"), "cause: {}", cause);
        assert!(cause.contains("循环单位"));
    }

    #[test]
    fn test_process_rejects_finished_row() {
        let mut row = row_with_name(4, "ABC代理").with_status(RowStatus::Existing);
        pipeline().process(&mut row);
        assert_eq!(row.status(), RowStatus::Error);
        assert!(row.output.error.is_some());
    }
}
