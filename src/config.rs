// ⚙️ Match Configuration - keyword tables, thresholds and pool sizing as data
//
// Every field has a default, so a config file only needs the keys it changes.

use crate::entities::{Bucket, Tier};
use crate::error::{MatchError, Result};
use anyhow::Context as AnyhowContext;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const BUCKETED_PROFILE: &str = "bucketed";
pub const FLAT_PROFILE: &str = "flat";

// ============================================================================
// TIER PROFILES
// ============================================================================

/// Which candidate universe a profile matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateUniverse {
    /// Per-bucket full / abbreviation pools with alias resolution
    Bucketed,

    /// Every registered name in one pool
    Flat,
}

/// A score band: scores above (or at, when inclusive) `min_score` get `tier`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBand {
    pub min_score: f64,
    #[serde(default)]
    pub inclusive: bool,
    pub tier: Tier,
}

impl TierBand {
    fn new(min_score: f64, inclusive: bool, tier: Tier) -> Self {
        TierBand { min_score, inclusive, tier }
    }

    fn admits(&self, score: f64) -> bool {
        if self.inclusive {
            score >= self.min_score
        } else {
            score > self.min_score
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierProfile {
    pub universe: CandidateUniverse,

    /// Highest band first
    pub bands: Vec<TierBand>,
}

impl TierProfile {
    /// ≥0.9 near-identical, ≥0.8 similar, >0.5 guessed
    pub fn bucketed() -> Self {
        TierProfile {
            universe: CandidateUniverse::Bucketed,
            bands: vec![
                TierBand::new(0.9, true, Tier::NearIdentical),
                TierBand::new(0.8, true, Tier::Similar),
                TierBand::new(0.5, false, Tier::Guessed),
            ],
        }
    }

    /// >0.8 near-identical, >0.5 similar, ≥0.2 guessed
    pub fn flat() -> Self {
        TierProfile {
            universe: CandidateUniverse::Flat,
            bands: vec![
                TierBand::new(0.8, false, Tier::NearIdentical),
                TierBand::new(0.5, false, Tier::Similar),
                TierBand::new(0.2, true, Tier::Guessed),
            ],
        }
    }

    /// First band that admits the score wins; nothing admitted → Unknown
    pub fn tier_for(&self, score: f64) -> Tier {
        self.bands
            .iter()
            .find(|band| band.admits(score))
            .map(|band| band.tier)
            .unwrap_or(Tier::Unknown)
    }

    fn validate(&self, name: &str) -> Result<()> {
        for band in &self.bands {
            if !(0.0..=1.0).contains(&band.min_score) {
                return Err(MatchError::Config(format!(
                    "profile '{}': band min_score {} outside [0, 1]",
                    name, band.min_score
                )));
            }
            if matches!(band.tier, Tier::Known | Tier::Unknown) {
                return Err(MatchError::Config(format!(
                    "profile '{}': tier '{}' can't be assigned by score",
                    name,
                    band.tier.label()
                )));
            }
        }
        if self.bands.windows(2).any(|w| w[0].min_score < w[1].min_score) {
            return Err(MatchError::Config(format!(
                "profile '{}': bands must be sorted highest first",
                name
            )));
        }
        Ok(())
    }
}

// ============================================================================
// CLASSIFIER RULES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRuleConfig {
    pub bucket: Bucket,
    pub pattern: String,
}

impl TypeRuleConfig {
    fn new(bucket: Bucket, pattern: &str) -> Self {
        TypeRuleConfig {
            bucket,
            pattern: pattern.to_string(),
        }
    }
}

// ============================================================================
// MATCH CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Worker pool size
    pub max_workers: usize,

    /// Batch deadline
    pub batch_timeout_secs: u64,

    /// Column holding the raw organization name
    pub name_column: String,

    /// Names shorter than this (in chars) are compared as abbreviations
    pub abbreviation_length_threshold: usize,

    /// Active tier profile (key into `profiles`)
    pub profile: String,
    pub profiles: BTreeMap<String, TierProfile>,

    /// Cut points for brief names, tried leftmost-first
    pub legal_entity_suffixes: Vec<String>,

    /// Pre-trim keywords in priority order
    pub organization_keywords: Vec<String>,

    /// Sub-office test
    pub branch_marker_pattern: String,

    pub region_names: Vec<String>,

    /// Administrative-level characters dropped before the region scan
    pub region_level_suffixes: Vec<String>,

    /// Enables the extraction-priority post-trim
    pub post_trim: bool,
    pub extraction_priority: Vec<String>,
    pub exclusion_keywords: Vec<String>,

    /// "Looks like a complete legal name"
    pub full_name_pattern: String,

    /// Broader than the bank classifier rule; short-circuits to nonexistent
    pub bank_like_pattern: String,

    /// Ordered classifier rules; first match wins
    pub type_rules: Vec<TypeRuleConfig>,

    /// Removed from the name before matching in the flat profile
    pub flat_strip_words: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(crate) const PROVINCES: &[&str] = &[
    "北京", "天津", "上海", "重庆", "河北", "山西", "辽宁", "吉林", "黑龙江", "江苏", "浙江",
    "安徽", "福建", "江西", "山东", "河南", "湖北", "湖南", "广东", "海南", "四川", "贵州",
    "云南", "陕西", "甘肃", "青海", "台湾", "内蒙古", "广西", "西藏", "宁夏", "新疆", "香港",
    "澳门",
];

const MAJOR_CITIES: &[&str] = &[
    "深圳", "广州", "大连", "青岛", "宁波", "厦门", "苏州", "杭州", "南京", "武汉", "成都",
    "西安", "沈阳", "长沙", "郑州", "济南", "福州", "合肥", "南昌", "昆明", "贵阳", "南宁",
    "海口", "太原", "石家庄", "哈尔滨", "长春", "呼和浩特", "兰州", "西宁", "银川", "乌鲁木齐",
    "拉萨", "无锡", "佛山", "东莞",
];

impl Default for MatchConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(BUCKETED_PROFILE.to_string(), TierProfile::bucketed());
        profiles.insert(FLAT_PROFILE.to_string(), TierProfile::flat());

        let mut region_names = strings(PROVINCES);
        region_names.extend(strings(MAJOR_CITIES));

        let mut flat_strip_words = strings(&[
            "营业部", "中心", "支公司", "分公司", "客服部", "客服处", "经纪", "服务",
        ]);
        flat_strip_words.extend(strings(PROVINCES));

        MatchConfig {
            max_workers: 4,
            batch_timeout_secs: 3600,
            name_column: "公司".to_string(),
            abbreviation_length_threshold: 12,
            profile: BUCKETED_PROFILE.to_string(),
            profiles,
            legal_entity_suffixes: strings(&[
                "有限公司",
                "有限责任公司",
                "（集团）公司",
                "股份有限公司",
                "（集团）股份有限公司",
                "公司",
            ]),
            organization_keywords: strings(&["公司", "银行", "集团"]),
            branch_marker_pattern: "^.{4,}(支|分|营业部|营业所|办事处)".to_string(),
            region_names,
            region_level_suffixes: strings(&["自治区", "省", "市", "县", "区"]),
            post_trim: false,
            extraction_priority: strings(&[
                "工商银行",
                "农业银行",
                "中国银行",
                "建设银行",
                "交通银行",
                "邮政储蓄银行",
                "招商银行",
                "浦发银行",
                "中信银行",
                "光大银行",
                "华夏银行",
                "民生银行",
                "广发银行",
                "兴业银行",
                "平安银行",
            ]),
            exclusion_keywords: strings(&[
                "财产保险", "人寿保险", "健康保险", "养老保险", "营业部", "支公司", "分公司", "客服",
            ]),
            full_name_pattern: "(有限公司|有限责任公司|银行)$".to_string(),
            bank_like_pattern: "银行|信用社|信用联社|农商行|农信|邮储".to_string(),
            type_rules: vec![
                TypeRuleConfig::new(Bucket::Bank, "银行"),
                TypeRuleConfig::new(Bucket::InsuranceAppraisal, "公估"),
                TypeRuleConfig::new(Bucket::InsuranceEconomic, "经纪"),
                TypeRuleConfig::new(Bucket::InsuranceAgency, "代理"),
                TypeRuleConfig::new(Bucket::InsuranceSale, "销售"),
                TypeRuleConfig::new(Bucket::InsuranceCompany, "保险"),
            ],
            flat_strip_words,
        }
    }
}

impl MatchConfig {
    /// Load config from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: MatchConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path.as_ref()))?;

        Ok(config)
    }

    pub fn with_profile(mut self, profile: &str) -> Self {
        self.profile = profile.to_string();
        self
    }

    pub fn active_profile(&self) -> Result<&TierProfile> {
        self.profiles.get(&self.profile).ok_or_else(|| {
            MatchError::Config(format!("unknown tier profile '{}'", self.profile))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(MatchError::Config("max_workers must be at least 1".to_string()));
        }
        if self.batch_timeout_secs == 0 {
            return Err(MatchError::Config("batch_timeout_secs must be positive".to_string()));
        }
        if self.name_column.trim().is_empty() {
            return Err(MatchError::Config("name_column can't be empty".to_string()));
        }

        self.active_profile()?;
        for (name, profile) in &self.profiles {
            profile.validate(name)?;
        }

        compile_pattern("branch_marker_pattern", &self.branch_marker_pattern)?;
        compile_pattern("full_name_pattern", &self.full_name_pattern)?;
        compile_pattern("bank_like_pattern", &self.bank_like_pattern)?;
        for rule in &self.type_rules {
            if rule.bucket == Bucket::Other {
                return Err(MatchError::Config(
                    "type_rules: 'other' is the fallback bucket and can't carry a rule".to_string(),
                ));
            }
            compile_pattern(rule.bucket.key(), &rule.pattern)?;
        }
        legal_suffix_pattern(&self.legal_entity_suffixes)?;

        Ok(())
    }
}

pub(crate) fn compile_pattern(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| MatchError::Config(format!("{}: invalid pattern '{}': {}", field, pattern, e)))
}

/// Alternation over the literal suffixes, in configured order
pub(crate) fn legal_suffix_pattern(suffixes: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = suffixes
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| regex::escape(s))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    compile_pattern("legal_entity_suffixes", &alternatives.join("|")).map(Some)
}

// ============================================================================
// TESTS
// ============================================================================
