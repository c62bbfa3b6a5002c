//! Mutational signature selection service
//!
//! Runs the survival-feature selection against injected reference data,
//! for one cohort or several in parallel.

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::application::services::ReferenceData;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{self, CountsTable, Selection, SelectionOptions};

/// Service selecting survival features for counts tables.
pub struct SignatureService {
    reference: ReferenceData,
}

impl SignatureService {
    /// Create a new signature service.
    pub fn new(reference: ReferenceData) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Select the survival features of one cohort.
    #[instrument(level = "debug", skip_all, fields(wgs = options.use_wgs_background))]
    pub fn select_survival_features(
        &self,
        counts: &CountsTable,
        options: &SelectionOptions,
    ) -> ApplicationResult<Selection> {
        validate_options(options)?;
        let hierarchy = self.reference.background(options.use_wgs_background)?;
        let selection = domain::select_survival_features(hierarchy, counts, options)?;
        debug!(
            "select_survival_features: {} survivors",
            selection.features().len()
        );
        Ok(selection)
    }

    /// Select several cohorts in parallel.
    ///
    /// Each cohort gets its own result; one failing table does not stop the others.
    pub fn select_many<'a>(
        &self,
        cohorts: &'a [(String, CountsTable)],
        options: &SelectionOptions,
    ) -> Vec<(&'a str, ApplicationResult<Selection>)> {
        let results: Vec<(&str, ApplicationResult<Selection>)> = cohorts
            .par_iter()
            .map(|(name, counts)| (name.as_str(), self.select_survival_features(counts, options)))
            .collect();

        debug!("select_many: evaluated {} cohorts", results.len());
        results
    }
}

/// Reject option values the tester cannot use.
pub fn validate_options(options: &SelectionOptions) -> ApplicationResult<()> {
    if !(options.p_threshold.is_finite() && options.p_threshold > 0.0 && options.p_threshold <= 1.0) {
        return Err(ApplicationError::config(format!(
            "p_threshold must lie in (0, 1], got {}",
            options.p_threshold
        )));
    }
    if !(options.correction_factor.is_finite() && options.correction_factor > 0.0) {
        return Err(ApplicationError::config(format!(
            "correction_factor must be positive, got {}",
            options.correction_factor
        )));
    }
    if !(options.pseudo_count.is_finite() && options.pseudo_count >= 0.0) {
        return Err(ApplicationError::config(format!(
            "pseudo_count must be non-negative, got {}",
            options.pseudo_count
        )));
    }
    Ok(())
}
