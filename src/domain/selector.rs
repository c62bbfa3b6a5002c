//! Top-down seeding and bottom-up residual pruning of surviving features.
//!
//! Phase 1 seeds the survival set with significant tier-A features. Phase 2
//! walks tiers B and C, admitting nodes whose parent survived and who are
//! significant themselves (nodes below a non-surviving parent follow the
//! [`UntestedParentPolicy`]). Phase 3 revisits tier B and then tier A: the
//! counts and background mass of leaves already explained by finer survivors
//! are subtracted before re-testing, and features whose excess disappears are
//! dropped. A feature's own excess is only reduced by explained leaves whose
//! parent survived phase 2; leaves admitted without a test still leave the
//! pool. The set only shrinks in phase 3 and is never empty on return.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};

use crate::domain::binomial::{
    BinomialTester, TestOutcome, DEFAULT_CORRECTION_FACTOR, DEFAULT_P_THRESHOLD,
};
use crate::domain::counts::{aggregate_counts, CountsTable};
use crate::domain::error::{DomainError, SchemaError, SieveError, SieveResult};
use crate::domain::feature::{FeatureId, Tier, ROOT_FEATURE};
use crate::domain::hierarchy::Hierarchy;
use crate::domain::tree::{AnnotatedTree, CountNode};

/// What to do with a node whose parent is not a surviving feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UntestedParentPolicy {
    /// Admit the node as significant
    #[default]
    Pass,
    /// Leave the node out
    Exclude,
}

/// Knobs of one selection run.
///
/// `use_wgs_background` only matters where a choice between genome and exome
/// reference data exists; the domain entry point takes its hierarchy as given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionOptions {
    pub p_threshold: f64,
    pub correction_factor: f64,
    pub pseudo_count: f64,
    pub use_wgs_background: bool,
    /// false: stop after seeding tier A
    pub test_all_tiers: bool,
    pub on_untested_parent: UntestedParentPolicy,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            p_threshold: DEFAULT_P_THRESHOLD,
            correction_factor: DEFAULT_CORRECTION_FACTOR,
            pseudo_count: 0.0,
            use_wgs_background: false,
            test_all_tiers: true,
            on_untested_parent: UntestedParentPolicy::Pass,
        }
    }
}

impl SelectionOptions {
    pub fn tester(&self) -> BinomialTester {
        BinomialTester::new(self.correction_factor, self.p_threshold)
    }
}

/// Mutable set of surviving feature ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SurvivalSet(BTreeSet<FeatureId>);

impl SurvivalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<FeatureId>) -> bool {
        self.0.insert(id.into())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.0.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Membership with the root always counted in.
    pub fn contains_or_root(&self, id: &str) -> bool {
        id == ROOT_FEATURE || self.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureId> {
        self.0.iter()
    }

    pub fn as_set(&self) -> &BTreeSet<FeatureId> {
        &self.0
    }

    /// Final result: the set itself, or the root alone when nothing survived.
    pub fn into_features(self) -> BTreeSet<FeatureId> {
        if self.0.is_empty() {
            BTreeSet::from([ROOT_FEATURE.to_string()])
        } else {
            self.0
        }
    }
}

/// Residualized re-test of one surviving feature.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualRecord {
    pub feature: FeatureId,
    pub tier: Tier,
    pub child_prob_sum: f64,
    pub child_q_sum: u64,
    pub parent_prob_sum: f64,
    pub parent_q_sum: u64,
    pub prob_pruned: f64,
    pub q_pruned: u64,
    pub size_pruned: u64,
    pub outcome: TestOutcome,
}

impl ResidualRecord {
    pub fn pruned(&self) -> bool {
        !self.outcome.is_significant
    }
}

/// Snapshots of the survival set across phases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionTrace {
    pub seeded: BTreeSet<FeatureId>,
    pub propagated: BTreeSet<FeatureId>,
    pub residuals: Vec<ResidualRecord>,
    pub pruned: Vec<FeatureId>,
}

/// Outcome of a selection run.
#[derive(Debug, Clone)]
pub struct Selection {
    features: BTreeSet<FeatureId>,
    trace: SelectionTrace,
    tree: AnnotatedTree,
}

impl Selection {
    /// Surviving features; `{TOTAL_MUTATIONS}` when nothing survived.
    pub fn features(&self) -> &BTreeSet<FeatureId> {
        &self.features
    }

    pub fn into_features(self) -> BTreeSet<FeatureId> {
        self.features
    }

    pub fn trace(&self) -> &SelectionTrace {
        &self.trace
    }

    pub fn tree(&self) -> &AnnotatedTree {
        &self.tree
    }

    /// True when no structure beyond the total burden survived.
    pub fn is_root_only(&self) -> bool {
        self.features.len() == 1 && self.features.contains(ROOT_FEATURE)
    }
}

/// Leaves below finer survivors at the start of one pruning step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplainedLeaves {
    /// Every explained leaf; removed from the parent's pool
    pub all: HashSet<FeatureId>,
    /// Explained leaves whose parent survived propagation; removed from the
    /// feature's own count and probability
    pub attributable: HashSet<FeatureId>,
}

/// Runs the three phases over a tested [`AnnotatedTree`].
pub struct Selector<'a> {
    hierarchy: &'a Hierarchy,
    tree: &'a AnnotatedTree,
    tester: BinomialTester,
    policy: UntestedParentPolicy,
    test_all_tiers: bool,
}

impl<'a> Selector<'a> {
    pub fn new(hierarchy: &'a Hierarchy, tree: &'a AnnotatedTree, tester: BinomialTester) -> Self {
        Self {
            hierarchy,
            tree,
            tester,
            policy: UntestedParentPolicy::default(),
            test_all_tiers: true,
        }
    }

    pub fn policy(mut self, policy: UntestedParentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn test_all_tiers(mut self, test_all_tiers: bool) -> Self {
        self.test_all_tiers = test_all_tiers;
        self
    }

    #[instrument(level = "debug", skip(self))]
    pub fn run(&self) -> SieveResult<(BTreeSet<FeatureId>, SelectionTrace)> {
        let mut set = SurvivalSet::new();
        let mut trace = SelectionTrace::default();

        self.seed(&mut set);
        trace.seeded = set.as_set().clone();
        info!("seeded {} tier-A features", set.len());
        if !self.test_all_tiers {
            return Ok((set.into_features(), trace));
        }

        self.propagate(&mut set);
        trace.propagated = set.as_set().clone();
        info!("{} features after top-down propagation", set.len());

        for tier in [Tier::B, Tier::A] {
            let records = self.prune_tier(&mut set, &trace.propagated, tier)?;
            trace
                .pruned
                .extend(records.iter().filter(|r| r.pruned()).map(|r| r.feature.clone()));
            trace.residuals.extend(records);
        }
        info!(
            "{} features after residual pruning ({} pruned)",
            set.len(),
            trace.pruned.len()
        );

        Ok((set.into_features(), trace))
    }

    /// Phase 1: every significant tier-A feature.
    pub fn seed(&self, set: &mut SurvivalSet) {
        for node in self.tree.nodes_in(Tier::A) {
            if node.is_significant() {
                debug!("seed: {}", node.feature_id);
                set.insert(node.feature_id.clone());
            }
        }
    }

    /// Phase 2: tier B then tier C.
    pub fn propagate(&self, set: &mut SurvivalSet) {
        for tier in [Tier::B, Tier::C] {
            // Decide the whole tier against the set as it stood before it
            let admitted: Vec<&CountNode> = self
                .tree
                .nodes_in(tier)
                .filter(|node| self.propagated_sig(node, set))
                .collect();
            for node in admitted {
                trace!("propagate: {}", node.feature_id);
                set.insert(node.feature_id.clone());
            }
        }
    }

    fn propagated_sig(&self, node: &CountNode, set: &SurvivalSet) -> bool {
        let parent_survives = node
            .parent_id
            .as_deref()
            .map_or(true, |p| set.contains_or_root(p));
        if parent_survives {
            node.is_significant()
        } else {
            match self.policy {
                UntestedParentPolicy::Pass => true,
                UntestedParentPolicy::Exclude => false,
            }
        }
    }

    /// Phase 3 step for one tier: re-test its survivors on residual counts.
    #[instrument(level = "debug", skip(self, set, propagated))]
    pub fn prune_tier(
        &self,
        set: &mut SurvivalSet,
        propagated: &BTreeSet<FeatureId>,
        tier: Tier,
    ) -> SieveResult<Vec<ResidualRecord>> {
        let explained = self.explained_leaves(set, propagated, tier);
        debug!(
            "{} leaves explained below tier {}, {} attributable",
            explained.all.len(),
            tier,
            explained.attributable.len()
        );

        let candidates: Vec<&CountNode> = self
            .tree
            .nodes_in(tier)
            .filter(|node| set.contains(&node.feature_id))
            .collect();

        let mut records = Vec::with_capacity(candidates.len());
        for node in candidates {
            let record = self.residualize(node, &explained)?;
            if record.pruned() {
                debug!(
                    "prune {}: q'={} n'={} p'={:.5} p={:.3e}",
                    record.feature,
                    record.q_pruned,
                    record.size_pruned,
                    record.prob_pruned,
                    record.outcome.p_value
                );
                set.remove(&record.feature);
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Leaves under surviving features strictly finer than `tier`, split by
    /// whether their parent is in `propagated` (the phase-2 set) or the root.
    pub fn explained_leaves(
        &self,
        set: &SurvivalSet,
        propagated: &BTreeSet<FeatureId>,
        tier: Tier,
    ) -> ExplainedLeaves {
        let all: HashSet<FeatureId> = set
            .iter()
            .filter(|id| {
                self.tree
                    .get(id)
                    .is_some_and(|node| node.tier.is_finer_than(tier))
            })
            .flat_map(|id| self.hierarchy.leaf_descendants(id).iter().cloned())
            .collect();
        let attributable = all
            .iter()
            .filter(|leaf| {
                self.hierarchy
                    .parent_of(leaf)
                    .map_or(true, |p| p.id == ROOT_FEATURE || propagated.contains(&p.id))
            })
            .cloned()
            .collect();
        ExplainedLeaves { all, attributable }
    }

    /// Subtract explained leaves below `node` and below its parent, then re-test.
    pub fn residualize(
        &self,
        node: &CountNode,
        explained: &ExplainedLeaves,
    ) -> SieveResult<ResidualRecord> {
        let parent = node.parent_id.as_deref().ok_or_else(|| SchemaError::UnknownFeature {
            feature: ROOT_FEATURE.to_string(),
            referenced_by: node.feature_id.clone(),
        })?;
        let sample_size = node.sample_size.unwrap_or(0);

        let (child_prob_sum, child_q_sum) =
            self.explained_mass(&node.feature_id, parent, &explained.attributable)?;
        let (parent_prob_sum, parent_q_sum) = self.explained_mass(parent, parent, &explained.all)?;

        let size_pruned = sample_size.saturating_sub(parent_q_sum);
        let fully_explained = self
            .hierarchy
            .leaf_descendants(&node.feature_id)
            .iter()
            .all(|leaf| explained.attributable.contains(leaf));
        let mut q_pruned = if fully_explained {
            0
        } else {
            node.observed_count.saturating_sub(child_q_sum)
        };
        if q_pruned > size_pruned {
            // Pseudo-count rounding or unattributed leaves below the feature
            debug!(
                "{}: residual count {} exceeds residual pool {}, clamping",
                node.feature_id, q_pruned, size_pruned
            );
            q_pruned = size_pruned;
        }

        let remaining = 1.0 - parent_prob_sum;
        let prob_pruned = if remaining > f64::EPSILON {
            let raw = (node.background_prob - child_prob_sum) / remaining;
            // Sibling probabilities that do not add up can leave counts without mass
            if raw <= 0.0 && q_pruned > 0 {
                return Err(SieveError::domain(
                    node.feature_id.clone(),
                    DomainError::ExhaustedBackground { residual: q_pruned },
                ));
            }
            raw.clamp(0.0, 1.0)
        } else {
            // Parent pool fully explained: nothing left to test
            q_pruned = 0;
            0.0
        };

        let outcome = self
            .tester
            .test(q_pruned, size_pruned, prob_pruned)
            .map_err(|e| SieveError::domain(node.feature_id.clone(), e))?;

        Ok(ResidualRecord {
            feature: node.feature_id.clone(),
            tier: node.tier,
            child_prob_sum,
            child_q_sum,
            parent_prob_sum,
            parent_q_sum,
            prob_pruned,
            q_pruned,
            size_pruned,
            outcome,
        })
    }

    /// Background mass (relative to `pool`) and count of explained leaves under `anchor`.
    fn explained_mass(
        &self,
        anchor: &str,
        pool: &str,
        explained: &HashSet<FeatureId>,
    ) -> SieveResult<(f64, u64)> {
        let mut prob = 0.0;
        let mut count: u64 = 0;
        for leaf in self
            .hierarchy
            .leaf_descendants(anchor)
            .iter()
            .filter(|leaf| explained.contains(*leaf))
        {
            prob += self
                .hierarchy
                .prob_relative_to(leaf, pool)
                .ok_or_else(|| SchemaError::UnknownFeature {
                    feature: leaf.clone(),
                    referenced_by: pool.to_string(),
                })?;
            count += self
                .tree
                .observed(leaf)
                .ok_or_else(|| SchemaError::MissingCount(leaf.clone()))?;
        }
        Ok((prob, count))
    }
}

/// Aggregate, annotate, test and select in one call.
#[instrument(level = "debug", skip_all, fields(samples = table.n_samples()))]
pub fn select_survival_features(
    hierarchy: &Hierarchy,
    table: &CountsTable,
    options: &SelectionOptions,
) -> SieveResult<Selection> {
    let counts = aggregate_counts(table, hierarchy, options.pseudo_count)?;
    let mut tree = AnnotatedTree::build(hierarchy, &counts)?;
    let tester = options.tester();
    tree.run_tests(&tester)?;

    let (features, trace) = Selector::new(hierarchy, &tree, tester)
        .policy(options.on_untested_parent)
        .test_all_tiers(options.test_all_tiers)
        .run()?;

    Ok(Selection {
        features,
        trace,
        tree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trinucleotide::leaf_contexts;

    fn table_with(overrides: &[(&str, i64)], base: i64) -> CountsTable {
        CountsTable::from_totals(leaf_contexts().into_iter().map(|c| {
            let value = overrides
                .iter()
                .find(|(k, _)| *k == c)
                .map_or(base, |(_, v)| *v);
            (c, value)
        }))
        .unwrap()
    }

    fn tested(table: &CountsTable, hierarchy: &Hierarchy) -> AnnotatedTree {
        let counts = aggregate_counts(table, hierarchy, 0.0).unwrap();
        let mut tree = AnnotatedTree::build(hierarchy, &counts).unwrap();
        tree.run_tests(&BinomialTester::default()).unwrap();
        tree
    }

    #[test]
    fn test_survival_set_falls_back_to_root() {
        assert_eq!(
            SurvivalSet::new().into_features(),
            BTreeSet::from([ROOT_FEATURE.to_string()])
        );
    }

    #[test]
    fn test_residual_without_explained_leaves_matches_plain_test() {
        let h = Hierarchy::uniform_trinucleotide().unwrap();
        let tree = tested(&table_with(&[("A[C>A]A", 2100)], 100), &h);
        let selector = Selector::new(&h, &tree, BinomialTester::default());
        let node = tree.get("C>A").unwrap();
        let record = selector.residualize(node, &ExplainedLeaves::default()).unwrap();
        assert_eq!(record.q_pruned, node.observed_count);
        assert_eq!(record.size_pruned, node.sample_size.unwrap());
        assert!((record.prob_pruned - node.background_prob).abs() < 1e-12);
        assert_eq!(record.outcome, node.test.unwrap());
    }

    #[test]
    fn test_residual_subtracts_explained_leaf() {
        let h = Hierarchy::uniform_trinucleotide().unwrap();
        let tree = tested(&table_with(&[("A[C>A]A", 2100)], 100), &h);
        let selector = Selector::new(&h, &tree, BinomialTester::default());
        let leaves = HashSet::from(["A[C>A]A".to_string()]);
        let explained = ExplainedLeaves {
            all: leaves.clone(),
            attributable: leaves,
        };

        let flank = selector
            .residualize(tree.get("A[C>A]N").unwrap(), &explained)
            .unwrap();
        assert_eq!(flank.child_q_sum, 2100);
        assert_eq!(flank.q_pruned, 300);
        assert_eq!(flank.size_pruned, 3600 - 2100);
        assert!((flank.prob_pruned - 0.2).abs() < 1e-12);
        assert!(flank.pruned());

        let class = selector
            .residualize(tree.get("C>A").unwrap(), &explained)
            .unwrap();
        assert_eq!(class.q_pruned, 1500);
        assert_eq!(class.size_pruned, 9500);
        assert!((class.prob_pruned - 15.0 / 95.0).abs() < 1e-12);
        assert!(class.pruned());
    }

    #[test]
    fn test_fully_explained_feature_is_pruned() {
        let h = Hierarchy::uniform_trinucleotide().unwrap();
        let tree = tested(&table_with(&[("A[C>A]A", 2100)], 100), &h);
        let selector = Selector::new(&h, &tree, BinomialTester::default());
        let leaves: HashSet<FeatureId> = h.leaf_descendants("A[C>A]N").iter().cloned().collect();
        let explained = ExplainedLeaves {
            all: leaves.clone(),
            attributable: leaves,
        };
        let record = selector
            .residualize(tree.get("A[C>A]N").unwrap(), &explained)
            .unwrap();
        assert_eq!(record.q_pruned, 0);
        assert_eq!(record.outcome.p_value, 1.0);
        assert!(record.pruned());
    }

    #[test]
    fn test_explained_leaves_only_from_finer_tiers() {
        let h = Hierarchy::uniform_trinucleotide().unwrap();
        let tree = tested(&table_with(&[], 100), &h);
        let selector = Selector::new(&h, &tree, BinomialTester::default());
        let mut set = SurvivalSet::new();
        set.insert("C>T");
        set.insert("G[C>T]N");
        set.insert("T[T>A]G");

        let propagated = set.as_set().clone();

        let below_b = selector.explained_leaves(&set, &propagated, Tier::B);
        assert_eq!(below_b.all, HashSet::from(["T[T>A]G".to_string()]));
        // T[T>A]N never survived, so the leaf leaves the pool only
        assert!(below_b.attributable.is_empty());
        let below_a = selector.explained_leaves(&set, &propagated, Tier::A);
        assert_eq!(below_a.all.len(), 5);
        assert_eq!(below_a.attributable.len(), 4);
        assert!(below_a.attributable.contains("G[C>T]C"));
    }

    #[test]
    fn test_passed_through_leaves_do_not_explain_their_class() {
        let h = Hierarchy::uniform_trinucleotide().unwrap();
        let tree = tested(&table_with(&[], 100), &h);
        let selector = Selector::new(&h, &tree, BinomialTester::default());
        let leaves: HashSet<FeatureId> = h.leaf_descendants("C>A").iter().cloned().collect();
        let explained = ExplainedLeaves {
            all: leaves,
            attributable: HashSet::new(),
        };

        let record = selector
            .residualize(tree.get("C>A").unwrap(), &explained)
            .unwrap();

        assert_eq!(record.child_q_sum, 0);
        assert_eq!(record.q_pruned, 1600);
        assert_eq!(record.parent_q_sum, 1600);
        assert_eq!(record.size_pruned, 9600 - 1600);
        assert!((record.prob_pruned - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_inconsistent_sibling_probabilities_exhaust_background() {
        // Two leaves together claim more mass than their class
        let mut records = Hierarchy::uniform_trinucleotide().unwrap().records();
        for record in &mut records {
            match record.feature.as_str() {
                "A[C>A]N" => record.background_prob = 0.9,
                "A[C>A]A" | "A[C>A]C" => record.background_prob = 0.99,
                _ => {}
            }
        }
        let h = Hierarchy::from_records(records).unwrap();
        let tree = tested(&table_with(&[], 100), &h);
        let selector = Selector::new(&h, &tree, BinomialTester::default());
        let leaves = HashSet::from(["A[C>A]A".to_string(), "A[C>A]C".to_string()]);
        let explained = ExplainedLeaves {
            all: leaves.clone(),
            attributable: leaves,
        };

        let err = selector
            .residualize(tree.get("C>A").unwrap(), &explained)
            .unwrap_err();

        assert_eq!(
            err,
            SieveError::domain("C>A", DomainError::ExhaustedBackground { residual: 1400 })
        );
    }

    #[test]
    fn test_shallow_mode_stops_after_seed() {
        let h = Hierarchy::uniform_trinucleotide().unwrap();
        let options = SelectionOptions {
            test_all_tiers: false,
            ..SelectionOptions::default()
        };
        let selection =
            select_survival_features(&h, &table_with(&[("A[C>A]A", 2100)], 100), &options).unwrap();
        assert_eq!(selection.features(), &BTreeSet::from(["C>A".to_string()]));
        assert!(selection.trace().propagated.is_empty());
        assert!(selection.trace().residuals.is_empty());
    }
}
