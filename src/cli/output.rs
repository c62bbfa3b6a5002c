//! Terminal output for selection results
//!
//! Data goes to stdout, diagnostics to stderr. `colored` honours NO_COLOR.

use std::fmt::Display;

use colored::Colorize;

use crate::domain::{ResidualRecord, Tier};

pub fn error(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

pub fn warning(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "warning".yellow(), msg);
}

/// Cohort name above its survivors.
pub fn cohort(name: &str, survivors: usize) {
    println!("{} ({} survivors)", name.cyan().bold(), survivors);
}

/// One survival feature, finer tiers indented deeper.
pub fn survivor(feature: &str, tier: Option<Tier>) {
    let indent = tier.map_or(1, |t| t.depth().max(1));
    println!("{:width$}{} {}", "", "●".green(), feature, width = indent * 2);
}

/// Residual re-test of a coarse survivor: pruned ones are red.
pub fn residual(record: &ResidualRecord) {
    let line = format!(
        "{} (tier {}): q'={} n'={} p'={:.5} p={:.3e}",
        record.feature,
        record.tier,
        record.q_pruned,
        record.size_pruned,
        record.prob_pruned,
        record.outcome.p_value
    );
    if record.pruned() {
        println!("    {} {}", "pruned".red(), line);
    } else {
        println!("    {} {}", "kept".green(), line);
    }
}

pub fn written(path: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "written".green(), path);
}

/// Labelled key/value line, e.g. for config locations.
pub fn location(label: &str, value: &(impl Display + ?Sized)) {
    println!("{:>8}: {}", label.green(), value);
}

/// Plain data (CSV, TOML, trees).
pub fn data(msg: &(impl Display + ?Sized)) {
    println!("{msg}");
}
