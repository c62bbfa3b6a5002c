//! CSV tables: hierarchy metadata, per-leaf rates and counts
//!
//! Hierarchy: `feature,parent,leaf_span,background_prob` (empty parent for the root).
//! Rates: `context,rate`, one row per trinucleotide context.
//! Counts: one column per leaf, one row per sample, optional leading `sample` column.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::{CountsTable, FeatureRecord, Hierarchy, SchemaError, SieveError};
use crate::infrastructure::traits::FileSystem;
use crate::infrastructure::{InfraError, InfraResult};

/// Header of the optional sample-name column in counts tables.
pub const SAMPLE_COLUMN: &str = "sample";

#[derive(Debug, Deserialize)]
struct RateRow {
    context: String,
    rate: f64,
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(content.as_bytes())
}

/// Parse hierarchy metadata rows and validate them into a [`Hierarchy`].
pub fn parse_hierarchy(content: &str, path: &Path) -> InfraResult<Hierarchy> {
    let records = reader(content)
        .deserialize::<FeatureRecord>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| InfraError::csv(path, e))?;
    debug!("parse_hierarchy: {} records from {}", records.len(), path.display());
    Ok(Hierarchy::from_records(records)?)
}

/// Parse a `context,rate` table.
pub fn parse_rates(content: &str, path: &Path) -> InfraResult<BTreeMap<String, f64>> {
    let mut rates = BTreeMap::new();
    for row in reader(content).deserialize::<RateRow>() {
        let row = row.map_err(|e| InfraError::csv(path, e))?;
        if rates.insert(row.context.clone(), row.rate).is_some() {
            return Err(SieveError::from(SchemaError::DuplicateFeature(row.context)).into());
        }
    }
    Ok(rates)
}

/// Parse a counts table; integral float cells such as `12.0` are accepted.
pub fn parse_counts(content: &str, path: &Path) -> InfraResult<CountsTable> {
    let mut reader = reader(content);
    let headers = reader
        .headers()
        .map_err(|e| InfraError::csv(path, e))?
        .clone();
    let named = headers
        .get(0)
        .is_some_and(|h| h.eq_ignore_ascii_case(SAMPLE_COLUMN));
    let skip = usize::from(named);
    let columns: Vec<String> = headers.iter().skip(skip).map(str::to_string).collect();

    let mut samples = Vec::new();
    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| InfraError::csv(path, e))?;
        let row_number = i + 1;
        samples.push(if named {
            record.get(0).unwrap_or_default().to_string()
        } else {
            format!("sample_{row_number}")
        });
        let row = record
            .iter()
            .skip(skip)
            .zip(&columns)
            .map(|(cell, column)| {
                parse_cell(cell).ok_or_else(|| InfraError::InvalidCell {
                    path: path.to_path_buf(),
                    row: row_number,
                    column: column.clone(),
                    value: cell.to_string(),
                })
            })
            .collect::<InfraResult<Vec<i64>>>()?;
        rows.push(row);
    }
    debug!(
        "parse_counts: {} samples x {} columns from {}",
        rows.len(),
        columns.len(),
        path.display()
    );
    Ok(CountsTable::with_samples(columns, samples, rows)?)
}

fn parse_cell(cell: &str) -> Option<i64> {
    cell.parse::<i64>().ok().or_else(|| {
        cell.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

/// Serialize a hierarchy back to metadata rows, root first.
pub fn hierarchy_to_csv(hierarchy: &Hierarchy) -> InfraResult<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for record in hierarchy.records() {
        writer
            .serialize(&record)
            .map_err(|e| InfraError::csv(Path::new("<memory>"), e))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| InfraError::io("flush hierarchy csv", e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads and writes tables through a [`FileSystem`].
#[derive(Clone)]
pub struct TableStore {
    fs: Arc<dyn FileSystem>,
}

impl TableStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    fn read(&self, path: &Path) -> InfraResult<String> {
        if !self.fs.exists(path) {
            return Err(InfraError::NotFound(path.to_path_buf()));
        }
        self.fs
            .read_to_string(path)
            .map_err(|e| InfraError::io(format!("read {}", path.display()), e))
    }

    pub fn read_hierarchy(&self, path: &Path) -> InfraResult<Hierarchy> {
        parse_hierarchy(&self.read(path)?, path)
    }

    pub fn read_rates(&self, path: &Path) -> InfraResult<BTreeMap<String, f64>> {
        parse_rates(&self.read(path)?, path)
    }

    pub fn read_counts(&self, path: &Path) -> InfraResult<CountsTable> {
        parse_counts(&self.read(path)?, path)
    }

    /// Load a background from either a hierarchy table or a per-leaf rate table.
    #[instrument(level = "debug", skip(self))]
    pub fn load_background(&self, path: &Path) -> InfraResult<Hierarchy> {
        let content = self.read(path)?;
        let is_rates = reader(&content)
            .headers()
            .map_err(|e| InfraError::csv(path, e))?
            .iter()
            .any(|h| h == "rate");
        if is_rates {
            let rates = parse_rates(&content, path)?;
            Ok(Hierarchy::trinucleotide(&rates)?)
        } else {
            parse_hierarchy(&content, path)
        }
    }

    pub fn write_hierarchy(&self, path: &Path, hierarchy: &Hierarchy) -> InfraResult<()> {
        let content = hierarchy_to_csv(hierarchy)?;
        self.fs
            .ensure_parent(path)
            .map_err(|e| InfraError::io(format!("create parent of {}", path.display()), e))?;
        self.fs
            .write(path, &content)
            .map_err(|e| InfraError::io(format!("write {}", path.display()), e))
    }
}
