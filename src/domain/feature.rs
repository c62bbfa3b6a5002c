//! Features: named mutation categories and their static metadata

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a mutation category, e.g. `C>T`, `A[C>T]N` or `A[C>T]G`.
pub type FeatureId = String;

/// The single root feature aggregating every mutation.
pub const ROOT_FEATURE: &str = "TOTAL_MUTATIONS";

/// Specificity level of a feature, by depth below the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Root,
    /// Broad substitution classes (children of the root)
    A,
    /// Substitution class with one flanking base
    B,
    /// Leaves: full trinucleotide contexts
    C,
}

impl Tier {
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            0 => Some(Tier::Root),
            1 => Some(Tier::A),
            2 => Some(Tier::B),
            3 => Some(Tier::C),
            _ => None,
        }
    }

    pub fn depth(self) -> usize {
        match self {
            Tier::Root => 0,
            Tier::A => 1,
            Tier::B => 2,
            Tier::C => 3,
        }
    }

    /// True if `self` is strictly more specific than `other`.
    pub fn is_finer_than(self, other: Tier) -> bool {
        self.depth() > other.depth()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Root => "root",
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
        };
        write!(f, "{}", s)
    }
}

/// One row of hierarchy metadata as supplied by reference data.
///
/// `background_prob` is conditional on the parent: the probability that a
/// mutation counted at the parent falls into this feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub feature: FeatureId,
    /// Empty or absent for the root
    #[serde(default)]
    pub parent: Option<FeatureId>,
    pub leaf_span: u32,
    pub background_prob: f64,
}

impl FeatureRecord {
    pub fn new(
        feature: impl Into<FeatureId>,
        parent: Option<&str>,
        leaf_span: u32,
        background_prob: f64,
    ) -> Self {
        Self {
            feature: feature.into(),
            parent: parent.map(str::to_string),
            leaf_span,
            background_prob,
        }
    }

    pub fn root(leaf_span: u32) -> Self {
        Self::new(ROOT_FEATURE, None, leaf_span, 1.0)
    }

    /// Parent id with empty strings treated as absent.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Validated per-feature metadata stored in the hierarchy arena.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMeta {
    pub id: FeatureId,
    pub tier: Tier,
    pub leaf_span: u32,
    pub background_prob: f64,
}

impl fmt::Display for FeatureMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
