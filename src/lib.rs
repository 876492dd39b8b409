// Member Reconciliation - Core Library
// Matches typed member-organization names against the registry roster.
// Spreadsheet I/O and the CLI live outside; this crate takes rows in and
// hands annotated rows back.

pub mod config;      // Keyword tables, tier profiles, pool sizing
pub mod error;
pub mod entities;    // Buckets, registry rows, sheet rows
pub mod segmenter;
pub mod normalizer;  // Raw name → normalized name
pub mod classifier;  // Name → business-type bucket
pub mod index;       // Registry maps + alias resolution
pub mod similarity;
pub mod pipeline;    // Per-row state machine
pub mod dispatcher;  // Worker pool + batch deadline

// Re-export commonly used types
pub use config::{
    CandidateUniverse, MatchConfig, TierBand, TierProfile, TypeRuleConfig,
    BUCKETED_PROFILE, FLAT_PROFILE,
};
pub use error::{MatchError, Result};
pub use entities::{
    Bucket, ReferenceEntry, ReferenceRow,
    RowOutput, RowRecord, RowStatus, SourceRef, Tier,
};
pub use segmenter::{JiebaSegmenter, LexiconSegmenter, Segmenter};
pub use normalizer::NameNormalizer;
pub use classifier::{TypeClassifier, TypeRule};
pub use index::{IndexEntry, MapRef, NameKind, NameMap, ReferenceIndex, Scope, MAX_ALIAS_HOPS};
pub use similarity::{sequence_ratio, CompareMode, SimilarityMatcher};
pub use pipeline::{MatchResult, RowPipeline};
pub use dispatcher::{
    check_row, reconcile, BatchOutcome, BatchReport, ConcurrentDispatcher, RowProcessor,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
