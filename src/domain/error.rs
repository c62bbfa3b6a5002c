//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::feature::FeatureId;

/// Schema errors: inputs whose shape does not match the feature hierarchy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("counts table is missing leaf columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("counts table has unexpected columns: {}", .0.join(", "))]
    UnexpectedColumns(Vec<String>),

    #[error("duplicate column in counts table: {0}")]
    DuplicateColumn(String),

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("unknown feature {feature} (referenced by {referenced_by})")]
    UnknownFeature {
        feature: FeatureId,
        referenced_by: String,
    },

    #[error("duplicate feature in hierarchy: {0}")]
    DuplicateFeature(FeatureId),

    #[error("hierarchy must have exactly one root {expected}, found: {}", .found.join(", "))]
    InvalidRoot {
        expected: &'static str,
        found: Vec<FeatureId>,
    },

    #[error("feature {0} is not reachable from the root (cycle or detached subtree)")]
    Unreachable(FeatureId),

    #[error("feature {feature} sits at depth {depth}, leaves must sit at depth 3")]
    InvalidDepth { feature: FeatureId, depth: usize },

    #[error("feature {feature} has leaf span {declared}, children sum to {expected}")]
    LeafSpanMismatch {
        feature: FeatureId,
        declared: u32,
        expected: u32,
    },

    #[error("feature {feature} has background probability {value} outside (0, 1)")]
    InvalidBackground { feature: FeatureId, value: f64 },

    #[error("no observed count for feature {0}")]
    MissingCount(FeatureId),

    #[error("invalid trinucleotide context: {0}")]
    InvalidContext(String),
}

/// Numeric errors: arguments outside the domain of the binomial test.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("observed count {q} exceeds sample size {n}")]
    CountExceedsSampleSize { q: u64, n: u64 },

    #[error("probability {0} outside [0, 1]")]
    ProbabilityOutOfRange(f64),

    #[error("negative count {0}")]
    NegativeCount(i64),

    #[error("pseudo count {0} must be finite and non-negative")]
    InvalidPseudoCount(f64),

    #[error("mutation count total overflows u64")]
    CountOverflow,

    #[error("{residual} residual mutations left with no background probability")]
    ExhaustedBackground { residual: u64 },
}

/// Any failure of the selection pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SieveError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("domain error at {feature}: {source}")]
    Domain {
        feature: FeatureId,
        #[source]
        source: DomainError,
    },
}

impl SieveError {
    pub fn domain(feature: impl Into<FeatureId>, source: DomainError) -> Self {
        Self::Domain {
            feature: feature.into(),
            source,
        }
    }
}

/// Result type for domain operations.
pub type SieveResult<T> = Result<T, SieveError>;
