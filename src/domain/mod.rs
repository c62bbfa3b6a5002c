//! Domain layer: feature hierarchy, count aggregation, binomial testing and selection
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod binomial;
pub mod counts;
pub mod error;
pub mod feature;
pub mod hierarchy;
pub mod selector;
pub mod tree;
pub mod trinucleotide;

pub use arena::{TreeArena, TreeNode};
pub use binomial::{upper_tail, BinomialTester, TestOutcome};
pub use counts::{aggregate_counts, AggregatedCounts, CountsTable};
pub use error::{DomainError, SchemaError, SieveError, SieveResult};
pub use feature::{FeatureId, FeatureMeta, FeatureRecord, Tier, ROOT_FEATURE};
pub use hierarchy::Hierarchy;
pub use selector::{
    select_survival_features, ExplainedLeaves, ResidualRecord, Selection, SelectionOptions, SelectionTrace,
    Selector, SurvivalSet, UntestedParentPolicy,
};
pub use tree::{AnnotatedTree, CountNode};
