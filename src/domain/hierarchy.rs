//! Static feature hierarchy: parent links, leaf spans and background probabilities.
//!
//! Reference data is validated once and then shared read-only (`Arc<Hierarchy>`)
//! between any number of selections.

use std::collections::{HashMap, HashSet};

use generational_arena::Index;
use tracing::{debug, instrument, warn};

use crate::domain::arena::TreeArena;
use crate::domain::error::{SchemaError, SieveResult};
use crate::domain::feature::{FeatureId, FeatureMeta, FeatureRecord, Tier, ROOT_FEATURE};

/// Sibling probabilities further than this from 1 are reported.
const SIBLING_SUM_TOLERANCE: f64 = 1e-3;

/// Validated hierarchy of features.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    tree: TreeArena<FeatureMeta>,
    index: HashMap<FeatureId, Index>,
    tiers: HashMap<Tier, Vec<Index>>,
    leaf_descendants: HashMap<FeatureId, Vec<FeatureId>>,
}

impl Hierarchy {
    /// Validate metadata rows and build the hierarchy.
    pub fn from_records(records: Vec<FeatureRecord>) -> SieveResult<Self> {
        HierarchyBuilder::new().build(records)
    }

    pub fn tree(&self) -> &TreeArena<FeatureMeta> {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn root(&self) -> Option<&FeatureMeta> {
        self.get(ROOT_FEATURE)
    }

    pub fn index_of(&self, id: &str) -> Option<Index> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&FeatureMeta> {
        self.index_of(id)
            .and_then(|idx| self.tree.get_node(idx))
            .map(|n| &n.data)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn parent_of(&self, id: &str) -> Option<&FeatureMeta> {
        let node = self.tree.get_node(self.index_of(id)?)?;
        self.tree.get_node(node.parent?).map(|p| &p.data)
    }

    pub fn children_of(&self, id: &str) -> Vec<&FeatureMeta> {
        self.index_of(id)
            .and_then(|idx| self.tree.get_node(idx))
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|&c| self.tree.get_node(c))
                    .map(|c| &c.data)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Features of one tier, in hierarchy order.
    pub fn features_in(&self, tier: Tier) -> impl Iterator<Item = &FeatureMeta> + '_ {
        self.tiers
            .get(&tier)
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.tree.get_node(idx))
            .map(|n| &n.data)
    }

    pub fn leaf_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.features_in(Tier::C).map(|m| m.id.as_str())
    }

    /// Tier-C leaves aggregated under `id`; a leaf maps to itself.
    pub fn leaf_descendants(&self, id: &str) -> &[FeatureId] {
        self.leaf_descendants
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Probability of `id` relative to the pool of `ancestor`.
    ///
    /// Product of the conditional probabilities on the path from `id` up to,
    /// but excluding, `ancestor`. `None` if `ancestor` is not above `id`.
    pub fn prob_relative_to(&self, id: &str, ancestor: &str) -> Option<f64> {
        if id == ancestor {
            return Some(1.0);
        }
        let target = self.index_of(ancestor)?;
        let mut idx = self.index_of(id)?;
        let mut prob = 1.0;
        loop {
            let node = self.tree.get_node(idx)?;
            prob *= node.data.background_prob;
            let parent = node.parent?;
            if parent == target {
                return Some(prob);
            }
            idx = parent;
        }
    }

    /// Metadata rows in hierarchy order, root first.
    pub fn records(&self) -> Vec<FeatureRecord> {
        self.tree
            .iter()
            .map(|(_, node)| FeatureRecord {
                feature: node.data.id.clone(),
                parent: node
                    .parent
                    .and_then(|p| self.tree.get_node(p))
                    .map(|p| p.data.id.clone()),
                leaf_span: node.data.leaf_span,
                background_prob: node.data.background_prob,
            })
            .collect()
    }
}

/// Constructs a [`Hierarchy`] from metadata rows.
pub struct HierarchyBuilder {
    relationship_cache: HashMap<FeatureId, Vec<FeatureId>>,
    visited: HashSet<FeatureId>,
}

impl Default for HierarchyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self {
            relationship_cache: HashMap::new(),
            visited: HashSet::new(),
        }
    }

    #[instrument(level = "debug", skip(self, records), fields(rows = records.len()))]
    pub fn build(&mut self, records: Vec<FeatureRecord>) -> SieveResult<Hierarchy> {
        self.relationship_cache.clear();
        self.visited.clear();

        let by_id = self.scan_records(&records)?;
        let root = self.find_root(&records)?;
        let (tree, index) = self.build_tree(&root, &by_id)?;

        // Anything not reached from the root is detached or part of a cycle
        if let Some(orphan) = records.iter().find(|r| !self.visited.contains(&r.feature)) {
            return Err(SchemaError::Unreachable(orphan.feature.clone()).into());
        }

        let tiers = validate_shape(&tree)?;
        validate_leaf_spans(&tree)?;
        validate_probabilities(&tree)?;

        let leaf_descendants = tree
            .iter()
            .map(|(idx, node)| {
                let leaves = tree
                    .leaves_under(idx)
                    .into_iter()
                    .filter_map(|l| tree.get_node(l))
                    .map(|l| l.data.id.clone())
                    .collect();
                (node.data.id.clone(), leaves)
            })
            .collect();

        debug!(
            "hierarchy built: {} features, {} leaves",
            tree.len(),
            tiers.get(&Tier::C).map_or(0, Vec::len)
        );

        Ok(Hierarchy {
            tree,
            index,
            tiers,
            leaf_descendants,
        })
    }

    fn scan_records<'a>(
        &mut self,
        records: &'a [FeatureRecord],
    ) -> SieveResult<HashMap<&'a str, &'a FeatureRecord>> {
        let mut by_id = HashMap::with_capacity(records.len());
        for record in records {
            if by_id.insert(record.feature.as_str(), record).is_some() {
                return Err(SchemaError::DuplicateFeature(record.feature.clone()).into());
            }
        }

        for record in records {
            if let Some(parent) = record.parent_id() {
                if !by_id.contains_key(parent) {
                    return Err(SchemaError::UnknownFeature {
                        feature: parent.to_string(),
                        referenced_by: record.feature.clone(),
                    }
                    .into());
                }
                self.relationship_cache
                    .entry(parent.to_string())
                    .or_default()
                    .push(record.feature.clone());
            }
        }
        Ok(by_id)
    }

    fn find_root(&self, records: &[FeatureRecord]) -> SieveResult<FeatureId> {
        let roots: Vec<FeatureId> = records
            .iter()
            .filter(|r| r.parent_id().is_none())
            .map(|r| r.feature.clone())
            .collect();

        match roots.as_slice() {
            [root] if root == ROOT_FEATURE => Ok(root.clone()),
            _ => Err(SchemaError::InvalidRoot {
                expected: ROOT_FEATURE,
                found: roots,
            }
            .into()),
        }
    }

    fn build_tree(
        &mut self,
        root: &str,
        by_id: &HashMap<&str, &FeatureRecord>,
    ) -> SieveResult<(TreeArena<FeatureMeta>, HashMap<FeatureId, Index>)> {
        let mut tree = TreeArena::with_capacity(by_id.len());
        let mut index = HashMap::with_capacity(by_id.len());
        let mut stack: Vec<(FeatureId, Option<Index>, usize)> = vec![(root.to_string(), None, 0)];

        while let Some((current, parent_idx, depth)) = stack.pop() {
            if !self.visited.insert(current.clone()) {
                return Err(SchemaError::Unreachable(current).into());
            }
            let record = by_id
                .get(current.as_str())
                .ok_or_else(|| SchemaError::UnknownFeature {
                    feature: current.clone(),
                    referenced_by: "hierarchy".to_string(),
                })?;
            let tier = Tier::from_depth(depth).ok_or_else(|| SchemaError::InvalidDepth {
                feature: current.clone(),
                depth,
            })?;

            let meta = FeatureMeta {
                id: current.clone(),
                tier,
                leaf_span: record.leaf_span,
                background_prob: if tier == Tier::Root {
                    1.0
                } else {
                    record.background_prob
                },
            };
            let current_idx = tree.insert_node(meta, parent_idx);
            index.insert(current.clone(), current_idx);

            // Reverse so children keep their record order
            if let Some(children) = self.relationship_cache.get(&current) {
                for child in children.iter().rev() {
                    stack.push((child.clone(), Some(current_idx), depth + 1));
                }
            }
        }

        Ok((tree, index))
    }
}

fn validate_shape(tree: &TreeArena<FeatureMeta>) -> SieveResult<HashMap<Tier, Vec<Index>>> {
    let mut tiers: HashMap<Tier, Vec<Index>> = HashMap::new();
    for (idx, node) in tree.iter() {
        if node.children.is_empty() && node.data.tier != Tier::C {
            return Err(SchemaError::InvalidDepth {
                feature: node.data.id.clone(),
                depth: node.data.tier.depth(),
            }
            .into());
        }
        tiers.entry(node.data.tier).or_default().push(idx);
    }
    Ok(tiers)
}

fn validate_leaf_spans(tree: &TreeArena<FeatureMeta>) -> SieveResult<()> {
    // Post-order so the deepest offending node is reported
    for (_, node) in tree.iter_postorder() {
        let expected = if node.children.is_empty() {
            1
        } else {
            node.children
                .iter()
                .filter_map(|&c| tree.get_node(c))
                .map(|c| c.data.leaf_span)
                .sum()
        };
        if node.data.leaf_span != expected {
            return Err(SchemaError::LeafSpanMismatch {
                feature: node.data.id.clone(),
                declared: node.data.leaf_span,
                expected,
            }
            .into());
        }
    }
    Ok(())
}

fn validate_probabilities(tree: &TreeArena<FeatureMeta>) -> SieveResult<()> {
    for (_, node) in tree.iter() {
        let p = node.data.background_prob;
        if node.data.tier != Tier::Root && !(p > 0.0 && p < 1.0) {
            return Err(SchemaError::InvalidBackground {
                feature: node.data.id.clone(),
                value: p,
            }
            .into());
        }
        if !node.children.is_empty() {
            let sum: f64 = node
                .children
                .iter()
                .filter_map(|&c| tree.get_node(c))
                .map(|c| c.data.background_prob)
                .sum();
            if (sum - 1.0).abs() > SIBLING_SUM_TOLERANCE {
                warn!(
                    "children of {} have background probabilities summing to {:.6}",
                    node.data.id, sum
                );
            }
        }
    }
    Ok(())
}
