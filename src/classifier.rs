// 🏷️ Type Classifier - Rules as Data
// Ordered pattern rules map a name to its business-type bucket.
// Order is the tie-break: "XX银行保险代理" is a bank, not an agency.

use crate::config::{compile_pattern, MatchConfig};
use crate::entities::Bucket;
use crate::error::Result;
use regex::Regex;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone)]
pub struct TypeRule {
    pub bucket: Bucket,
    pattern: Regex,
}

impl TypeRule {
    pub fn new(bucket: Bucket, pattern: &str) -> Result<Self> {
        Ok(TypeRule {
            bucket,
            pattern: compile_pattern(bucket.key(), pattern)?,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Clone)]
pub struct TypeClassifier {
    rules: Vec<TypeRule>,
}

impl TypeClassifier {
    /// Rules are kept in configured order - no re-sorting
    pub fn from_rules(rules: Vec<TypeRule>) -> Self {
        TypeClassifier { rules }
    }

    pub fn from_config(config: &MatchConfig) -> Result<Self> {
        let rules = config
            .type_rules
            .iter()
            .map(|rule| TypeRule::new(rule.bucket, &rule.pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(TypeClassifier::from_rules(rules))
    }

    /// First matching rule wins; no match → related institution
    pub fn classify(&self, name: &str) -> (&'static str, Bucket) {
        let bucket = self.bucket_for(name);
        (bucket.label(), bucket)
    }

    pub fn bucket_for(&self, name: &str) -> Bucket {
        self.rules
            .iter()
            .find(|rule| rule.matches(name))
            .map(|rule| rule.bucket)
            .unwrap_or(Bucket::Other)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================
