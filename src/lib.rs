//! mutsieve: sparse mutational signatures from hierarchical binomial testing.
//!
//! Mutation counts are aggregated over a three-tier hierarchy of substitution
//! categories, each node is tested for excess burden against its parent, and a
//! top-down then bottom-up pass keeps the most specific features that still
//! explain the excess.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;
