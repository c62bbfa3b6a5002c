//! Service container for dependency injection
//!
//! Wires settings, table I/O and reference data into services.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::application::{ApplicationError, ReferenceData, SignatureService};
use crate::config::Settings;
use crate::infrastructure::tables::TableStore;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::InfraResult;

/// Container holding settings and I/O dependencies.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    tables: TableStore,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        let tables = TableStore::new(fs.clone());
        Self {
            settings,
            fs,
            tables,
        }
    }

    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    /// Load the backgrounds.
    ///
    /// `hierarchy` replaces both configured backgrounds; otherwise the exome
    /// background is required and the genome one is loaded when configured.
    pub fn reference_data(&self, hierarchy: Option<&Path>) -> InfraResult<ReferenceData> {
        if let Some(path) = hierarchy {
            debug!("reference_data: override {}", path.display());
            let background = Arc::new(self.tables.load_background(path)?);
            return Ok(ReferenceData::new(background.clone()).with_genome(background));
        }

        let background = &self.settings.background;
        let exome_path = background
            .exome
            .as_deref()
            .ok_or_else(|| ApplicationError::MissingBackground("exome".to_string()))?;
        let mut reference = ReferenceData::new(Arc::new(self.tables.load_background(exome_path)?));
        if let Some(genome_path) = background.genome.as_deref() {
            reference = reference.with_genome(Arc::new(self.tables.load_background(genome_path)?));
        }
        Ok(reference)
    }

    /// Signature service over the loaded reference data.
    pub fn signature_service(&self, hierarchy: Option<&Path>) -> InfraResult<SignatureService> {
        Ok(SignatureService::new(self.reference_data(hierarchy)?))
    }
}
