//! The standard 96-context single-base-substitution topology.
//!
//! Tier A: the six pyrimidine-centred substitution classes (`C>T`).
//! Tier B: class plus 5' flanking base (`A[C>T]N`).
//! Tier C: class plus both flanking bases (`A[C>T]G`).
//!
//! Background values are never invented here: callers supply a relative
//! rate per leaf context (mutation opportunity times rate, from reference
//! data) and conditional probabilities are derived from those masses.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use itertools::iproduct;
use regex::Regex;

use crate::domain::error::{SchemaError, SieveResult};
use crate::domain::feature::{FeatureRecord, ROOT_FEATURE};
use crate::domain::hierarchy::Hierarchy;

pub const SUBSTITUTIONS: [&str; 6] = ["C>A", "C>G", "C>T", "T>A", "T>C", "T>G"];
pub const BASES: [char; 4] = ['A', 'C', 'G', 'T'];

fn context_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // pattern is a literal, compiled once
    RE.get_or_init(|| {
        Regex::new(r"^([ACGT])\[([CT])>([ACGT])\]([ACGT])$").expect("static context pattern")
    })
}

/// Tier-C leaf name, e.g. `A[C>T]G`.
pub fn leaf_name(five: char, substitution: &str, three: char) -> String {
    format!("{five}[{substitution}]{three}")
}

/// Tier-B name, e.g. `A[C>T]N`.
pub fn flank_name(five: char, substitution: &str) -> String {
    format!("{five}[{substitution}]N")
}

/// All 96 leaf contexts in canonical order (class, 5' base, 3' base).
pub fn leaf_contexts() -> Vec<String> {
    iproduct!(SUBSTITUTIONS, BASES, BASES)
        .map(|(sub, five, three)| leaf_name(five, sub, three))
        .collect()
}

/// Check a leaf context name; returns (5' base, substitution, 3' base).
pub fn parse_context(context: &str) -> SieveResult<(char, String, char)> {
    let caps = context_regex()
        .captures(context)
        .ok_or_else(|| SchemaError::InvalidContext(context.to_string()))?;
    let reference = &caps[2];
    let alternate = &caps[3];
    if reference == alternate {
        return Err(SchemaError::InvalidContext(context.to_string()).into());
    }
    let five = caps[1].chars().next().unwrap_or('N');
    let three = caps[4].chars().next().unwrap_or('N');
    Ok((five, format!("{reference}>{alternate}"), three))
}

impl Hierarchy {
    /// Build the 96-context hierarchy from per-leaf relative rates.
    ///
    /// Every leaf context must be present with a finite positive rate.
    pub fn trinucleotide(leaf_rates: &BTreeMap<String, f64>) -> SieveResult<Self> {
        for context in leaf_rates.keys() {
            parse_context(context)?;
        }
        let missing: Vec<String> = leaf_contexts()
            .into_iter()
            .filter(|c| !leaf_rates.contains_key(c))
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns(missing).into());
        }
        if let Some((context, &rate)) = leaf_rates
            .iter()
            .find(|(_, r)| !(r.is_finite() && **r > 0.0))
        {
            return Err(SchemaError::InvalidBackground {
                feature: context.clone(),
                value: rate,
            }
            .into());
        }

        let flank_mass = |five: char, sub: &str| -> f64 {
            BASES
                .iter()
                .map(|&three| leaf_rates[&leaf_name(five, sub, three)])
                .sum()
        };
        let class_mass = |sub: &str| -> f64 { BASES.iter().map(|&five| flank_mass(five, sub)).sum() };
        let total: f64 = SUBSTITUTIONS.iter().map(|&s| class_mass(s)).sum();

        let mut records = vec![FeatureRecord::root(96)];
        for sub in SUBSTITUTIONS {
            let class = class_mass(sub);
            records.push(FeatureRecord::new(sub, Some(ROOT_FEATURE), 16, class / total));
            for five in BASES {
                let flank = flank_mass(five, sub);
                let flank_id = flank_name(five, sub);
                records.push(FeatureRecord::new(flank_id.clone(), Some(sub), 4, flank / class));
                for three in BASES {
                    let leaf = leaf_name(five, sub, three);
                    let rate = leaf_rates[&leaf];
                    records.push(FeatureRecord::new(leaf, Some(&flank_id), 1, rate / flank));
                }
            }
        }

        Hierarchy::from_records(records)
    }

    /// 96-context hierarchy with every leaf equally likely.
    pub fn uniform_trinucleotide() -> SieveResult<Self> {
        let rates = leaf_contexts().into_iter().map(|c| (c, 1.0)).collect();
        Hierarchy::trinucleotide(&rates)
    }
}
