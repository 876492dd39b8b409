// 🏢 Organization Entity - reference registry records
//
// Reference rows come from the member registry (单位名称 / 简称 / 单位类别).
// Each row becomes exactly one terminal ReferenceEntry; abbreviations and
// brief names only ever point at it.

use serde::{Deserialize, Serialize};

// ============================================================================
// BUCKET
// ============================================================================

/// Business-type bucket that scopes candidate pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Banks (银行)
    Bank,

    /// Insurance loss adjusters (公估)
    InsuranceAppraisal,

    /// Insurance brokers (经纪)
    InsuranceEconomic,

    /// Insurance agencies (代理)
    InsuranceAgency,

    /// Insurance sales companies (销售)
    InsuranceSale,

    /// Insurers (保险)
    InsuranceCompany,

    /// Everything else - related institutions
    Other,
}

impl Bucket {
    pub const ALL: [Bucket; 7] = [
        Bucket::Bank,
        Bucket::InsuranceAppraisal,
        Bucket::InsuranceEconomic,
        Bucket::InsuranceAgency,
        Bucket::InsuranceSale,
        Bucket::InsuranceCompany,
        Bucket::Other,
    ];

    /// Stable key, matches the serde representation
    pub fn key(&self) -> &'static str {
        match self {
            Bucket::Bank => "bank",
            Bucket::InsuranceAppraisal => "insurance_appraisal",
            Bucket::InsuranceEconomic => "insurance_economic",
            Bucket::InsuranceAgency => "insurance_agency",
            Bucket::InsuranceSale => "insurance_sale",
            Bucket::InsuranceCompany => "insurance_company",
            Bucket::Other => "other",
        }
    }

    /// Human-readable business type written to output rows
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Bank => "bank",
            Bucket::InsuranceAppraisal => "appraisal company",
            Bucket::InsuranceEconomic => "brokerage company",
            Bucket::InsuranceAgency => "agency company",
            Bucket::InsuranceSale => "sales company",
            Bucket::InsuranceCompany => "insurance company",
            Bucket::Other => "related institution",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

// ============================================================================
// REFERENCE ROW (input)
// ============================================================================

/// One registry row as delivered by the spreadsheet layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    #[serde(alias = "单位名称")]
    pub full_name: String,

    #[serde(alias = "简称")]
    pub abbreviation: String,

    #[serde(alias = "单位类别", default)]
    pub business_type: String,
}

impl ReferenceRow {
    pub fn new(full_name: &str, abbreviation: &str, business_type: &str) -> Self {
        ReferenceRow {
            full_name: full_name.to_string(),
            abbreviation: abbreviation.to_string(),
            business_type: business_type.to_string(),
        }
    }
}

// ============================================================================
// REFERENCE ENTRY (terminal)
// ============================================================================

/// Terminal record in the reference index - never mutated after insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub full_name: String,
    pub business_type: String,
    pub bucket: Bucket,
}

impl ReferenceEntry {
    /// Business type for output; falls back to the bucket label when the
    /// registry left the column blank
    pub fn type_label(&self) -> &str {
        if self.business_type.trim().is_empty() {
            self.bucket.label()
        } else {
            &self.business_type
        }
    }
}
