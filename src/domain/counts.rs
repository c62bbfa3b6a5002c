//! Per-sample count tables and their reduction to per-feature totals.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, instrument};

use crate::domain::error::{DomainError, SchemaError, SieveError, SieveResult};
use crate::domain::feature::{FeatureId, ROOT_FEATURE};
use crate::domain::hierarchy::Hierarchy;

/// Mutation counts, one row per sample and one column per leaf feature.
///
/// An optional `TOTAL_MUTATIONS` column is accepted and ignored; totals are
/// always recomputed from the leaves.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountsTable {
    columns: Vec<String>,
    samples: Vec<String>,
    rows: Vec<Vec<i64>>,
}

impl CountsTable {
    /// Table without sample names; rows are named by position.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<i64>>) -> SieveResult<Self> {
        let samples = (1..=rows.len()).map(|i| format!("sample_{i}")).collect();
        Self::with_samples(columns, samples, rows)
    }

    pub fn with_samples(
        columns: Vec<String>,
        samples: Vec<String>,
        rows: Vec<Vec<i64>>,
    ) -> SieveResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.clone()).into());
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(SchemaError::RaggedRow {
                    row: i + 1,
                    found: row.len(),
                    expected: columns.len(),
                }
                .into());
            }
        }
        Ok(Self {
            columns,
            samples,
            rows,
        })
    }

    /// Single-sample table from `(column, count)` pairs.
    pub fn from_totals<I, S>(totals: I) -> SieveResult<Self>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let (columns, row): (Vec<String>, Vec<i64>) =
            totals.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self::new(columns, vec![row])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn rows(&self) -> &[Vec<i64>] {
        &self.rows
    }

    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    /// Column-wise sums; negative cells are rejected naming their column.
    pub fn column_sums(&self) -> SieveResult<BTreeMap<String, u64>> {
        let mut sums: BTreeMap<String, u64> = BTreeMap::new();
        for (c, column) in self.columns.iter().enumerate() {
            let mut total: u64 = 0;
            for row in &self.rows {
                let value = row[c];
                if value < 0 {
                    return Err(SieveError::domain(column.clone(), DomainError::NegativeCount(value)));
                }
                total = total
                    .checked_add(value as u64)
                    .ok_or_else(|| SieveError::domain(column.clone(), DomainError::CountOverflow))?;
            }
            sums.insert(column.clone(), total);
        }
        Ok(sums)
    }
}

/// Observed totals per feature, covering every node of a hierarchy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedCounts {
    totals: BTreeMap<FeatureId, u64>,
}

impl AggregatedCounts {
    pub fn get(&self, feature: &str) -> Option<u64> {
        self.totals.get(feature).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.totals.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.get(ROOT_FEATURE).unwrap_or(0)
    }
}

impl FromIterator<(FeatureId, u64)> for AggregatedCounts {
    fn from_iter<I: IntoIterator<Item = (FeatureId, u64)>>(iter: I) -> Self {
        Self {
            totals: iter.into_iter().collect(),
        }
    }
}

/// Check that the table's columns are exactly the hierarchy's leaves,
/// optionally plus the root column.
pub fn validate_columns(table: &CountsTable, hierarchy: &Hierarchy) -> SieveResult<()> {
    let expected: HashSet<&str> = hierarchy.leaf_ids().collect();
    let present: HashSet<&str> = table.columns().iter().map(String::as_str).collect();

    let missing: Vec<String> = hierarchy
        .leaf_ids()
        .filter(|leaf| !present.contains(leaf))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns(missing).into());
    }

    let unexpected: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| c.as_str() != ROOT_FEATURE && !expected.contains(c.as_str()))
        .cloned()
        .collect();
    if !unexpected.is_empty() {
        return Err(SchemaError::UnexpectedColumns(unexpected).into());
    }
    Ok(())
}

/// Reduce a counts table to per-feature totals for every hierarchy node.
///
/// Internal nodes total their leaves. With `pseudo_count > 0` each total
/// becomes `round(total + pseudo_count * leaf_span / 3)`, halves rounded away
/// from zero; with `pseudo_count == 0` the integer sums are returned as is.
#[instrument(level = "debug", skip(table, hierarchy), fields(samples = table.n_samples()))]
pub fn aggregate_counts(
    table: &CountsTable,
    hierarchy: &Hierarchy,
    pseudo_count: f64,
) -> SieveResult<AggregatedCounts> {
    if !(pseudo_count.is_finite() && pseudo_count >= 0.0) {
        return Err(SieveError::domain(
            ROOT_FEATURE,
            DomainError::InvalidPseudoCount(pseudo_count),
        ));
    }
    validate_columns(table, hierarchy)?;
    let sums = table.column_sums()?;

    let tree = hierarchy.tree();
    let mut raw: BTreeMap<FeatureId, u64> = BTreeMap::new();
    for (_, node) in tree.iter_postorder() {
        let total = if node.children.is_empty() {
            sums.get(&node.data.id).copied().unwrap_or(0)
        } else {
            node.children
                .iter()
                .filter_map(|&c| tree.get_node(c))
                .filter_map(|c| raw.get(&c.data.id))
                .try_fold(0u64, |acc, &q| acc.checked_add(q))
                .ok_or_else(|| SieveError::domain(node.data.id.clone(), DomainError::CountOverflow))?
        };
        raw.insert(node.data.id.clone(), total);
    }

    if pseudo_count == 0.0 {
        debug!("aggregated {} features, total {}", raw.len(), raw.get(ROOT_FEATURE).unwrap_or(&0));
        return Ok(AggregatedCounts { totals: raw });
    }

    let totals = raw
        .into_iter()
        .map(|(feature, total)| {
            let span = hierarchy.get(&feature).map_or(1, |m| m.leaf_span);
            let smoothed = total as f64 + pseudo_count * f64::from(span) / 3.0;
            (feature, smoothed.round() as u64)
        })
        .collect();
    Ok(AggregatedCounts { totals })
}
