//! Annotated count tree: hierarchy metadata joined with observed counts.

use std::collections::HashMap;
use std::fmt;

use generational_arena::Index;
use tracing::{instrument, trace};

use crate::domain::arena::TreeArena;
use crate::domain::binomial::{BinomialTester, TestOutcome};
use crate::domain::counts::AggregatedCounts;
use crate::domain::error::{SchemaError, SieveError, SieveResult};
use crate::domain::feature::{FeatureId, Tier};
use crate::domain::hierarchy::Hierarchy;

/// One feature with its count, its parent's count and its test result.
#[derive(Debug, Clone, PartialEq)]
pub struct CountNode {
    pub feature_id: FeatureId,
    pub parent_id: Option<FeatureId>,
    pub tier: Tier,
    pub leaf_span: u32,
    pub background_prob: f64,
    /// q: mutations observed in this feature
    pub observed_count: u64,
    /// n: the parent's observed count; None for the root
    pub sample_size: Option<u64>,
    /// q / n, informational only
    pub prop: Option<f64>,
    pub test: Option<TestOutcome>,
}

impl CountNode {
    pub fn is_significant(&self) -> bool {
        self.test.is_some_and(|t| t.is_significant)
    }

    pub fn p_value(&self) -> Option<f64> {
        self.test.map(|t| t.p_value)
    }
}

impl fmt::Display for CountNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} q={}", self.feature_id, self.observed_count)?;
        if let Some(n) = self.sample_size {
            write!(f, " n={} p0={:.4}", n, self.background_prob)?;
        }
        if let Some(t) = self.test {
            write!(f, " p={:.3e} adj={:.3e}", t.p_value, t.corrected_p_value)?;
            if t.is_significant {
                write!(f, " *")?;
            }
        }
        Ok(())
    }
}

/// The hierarchy with counts attached, one node per feature.
#[derive(Debug, Clone)]
pub struct AnnotatedTree {
    tree: TreeArena<CountNode>,
    index: HashMap<FeatureId, Index>,
    tiers: HashMap<Tier, Vec<Index>>,
}

impl AnnotatedTree {
    /// Join every hierarchy feature with its own and its parent's count.
    #[instrument(level = "debug", skip_all)]
    pub fn build(hierarchy: &Hierarchy, counts: &AggregatedCounts) -> SieveResult<Self> {
        let source = hierarchy.tree();
        for (_, node) in source.iter() {
            if counts.get(&node.data.id).is_none() {
                return Err(SchemaError::MissingCount(node.data.id.clone()).into());
            }
        }

        let (tree, _) = source.map(|idx, meta| {
            let observed_count = counts.get(&meta.id).unwrap_or(0);
            let parent_id = source
                .get_node(idx)
                .and_then(|n| n.parent)
                .and_then(|p| source.get_node(p))
                .map(|p| p.data.id.clone());
            let sample_size = parent_id.as_deref().and_then(|p| counts.get(p));
            let prop = sample_size
                .filter(|&n| n > 0)
                .map(|n| observed_count as f64 / n as f64);
            CountNode {
                feature_id: meta.id.clone(),
                parent_id,
                tier: meta.tier,
                leaf_span: meta.leaf_span,
                background_prob: meta.background_prob,
                observed_count,
                sample_size,
                prop,
                test: None,
            }
        });

        let mut index = HashMap::with_capacity(tree.len());
        let mut tiers: HashMap<Tier, Vec<Index>> = HashMap::new();
        for (idx, node) in tree.iter() {
            index.insert(node.data.feature_id.clone(), idx);
            tiers.entry(node.data.tier).or_default().push(idx);
        }

        Ok(Self { tree, index, tiers })
    }

    /// Test every non-root node against its parent's count.
    #[instrument(level = "debug", skip_all)]
    pub fn run_tests(&mut self, tester: &BinomialTester) -> SieveResult<()> {
        let indices: Vec<Index> = self.tree.iter().map(|(idx, _)| idx).collect();
        for idx in indices {
            let Some(node) = self.tree.get_node_mut(idx) else {
                continue;
            };
            let data = &mut node.data;
            let Some(n) = data.sample_size else {
                continue;
            };
            let outcome = tester
                .test(data.observed_count, n, data.background_prob)
                .map_err(|e| SieveError::domain(data.feature_id.clone(), e))?;
            trace!(
                "{}: q={} n={} p0={:.5} p={:.3e}",
                data.feature_id,
                data.observed_count,
                n,
                data.background_prob,
                outcome.p_value
            );
            data.test = Some(outcome);
        }
        Ok(())
    }

    pub fn tree(&self) -> &TreeArena<CountNode> {
        &self.tree
    }

    pub fn get(&self, id: &str) -> Option<&CountNode> {
        self.index
            .get(id)
            .and_then(|&idx| self.tree.get_node(idx))
            .map(|n| &n.data)
    }

    pub fn observed(&self, id: &str) -> Option<u64> {
        self.get(id).map(|n| n.observed_count)
    }

    /// Nodes of one tier, in hierarchy order.
    pub fn nodes_in(&self, tier: Tier) -> impl Iterator<Item = &CountNode> + '_ {
        self.tiers
            .get(&tier)
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.tree.get_node(idx))
            .map(|n| &n.data)
    }

    /// Every non-root node, in hierarchy order.
    pub fn rows(&self) -> impl Iterator<Item = &CountNode> + '_ {
        self.tree
            .iter()
            .map(|(_, n)| &n.data)
            .filter(|d| d.tier != Tier::Root)
    }
}
