//! Immutable background hierarchies for exome and genome sequencing.

use std::sync::Arc;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::Hierarchy;

/// Exome background, plus an optional whole-genome one.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    exome: Arc<Hierarchy>,
    genome: Option<Arc<Hierarchy>>,
}

impl ReferenceData {
    pub fn new(exome: Arc<Hierarchy>) -> Self {
        Self {
            exome,
            genome: None,
        }
    }

    pub fn with_genome(mut self, genome: Arc<Hierarchy>) -> Self {
        self.genome = Some(genome);
        self
    }

    pub fn exome(&self) -> &Arc<Hierarchy> {
        &self.exome
    }

    pub fn genome(&self) -> Option<&Arc<Hierarchy>> {
        self.genome.as_ref()
    }

    /// Pick the background matching the sequencing type.
    pub fn background(&self, use_wgs: bool) -> ApplicationResult<&Arc<Hierarchy>> {
        if use_wgs {
            self.genome
                .as_ref()
                .ok_or_else(|| ApplicationError::MissingBackground("genome".to_string()))
        } else {
            Ok(&self.exome)
        }
    }
}
