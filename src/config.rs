//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/mutsieve/mutsieve.toml`
//! 3. Local config: file passed with `--config`
//! 4. Environment variables: `MUTSIEVE_*` prefix, `__` between section and key

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::{validate_options, ApplicationError};
use crate::domain::{SelectionOptions, UntestedParentPolicy};

/// Prefix of environment overrides, e.g. `MUTSIEVE_SELECTION__P_THRESHOLD`.
pub const ENV_PREFIX: &str = "MUTSIEVE";

/// Reference background tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Exome background (hierarchy or per-leaf rate CSV)
    pub exome: Option<PathBuf>,
    /// Whole-genome background, used with `use_wgs_background`
    pub genome: Option<PathBuf>,
}

/// Raw selection config for intermediate parsing (`None` → inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSelectionConfig {
    pub p_threshold: Option<f64>,
    pub correction_factor: Option<f64>,
    pub pseudo_count: Option<f64>,
    pub use_wgs_background: Option<bool>,
    pub test_all_tiers: Option<bool>,
    pub on_untested_parent: Option<UntestedParentPolicy>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub selection: RawSelectionConfig,
    pub background: RawBackgroundConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawBackgroundConfig {
    pub exome: Option<PathBuf>,
    pub genome: Option<PathBuf>,
}

/// Unified configuration for mutsieve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub selection: SelectionOptions,
    pub background: BackgroundConfig,
}

/// Get the XDG config directory for mutsieve.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mutsieve").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("mutsieve.toml"))
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the path as is.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// `local` is an explicit config file and must exist when given.
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref(), local, None)
    }

    /// Layered load with explicit sources.
    ///
    /// `env` replaces the process environment when given (keys carry the prefix).
    pub fn load_from(
        global: Option<&Path>,
        local: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ApplicationError> {
        // 1. Defaults
        let mut current = Self::default();

        // 2. Global config, skipped when absent
        if let Some(global_path) = global {
            if global_path.exists() {
                let raw = load_raw_settings(global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Explicit local config
        if let Some(local_path) = local {
            if !local_path.exists() {
                return Err(ApplicationError::config(format!(
                    "config file not found: {}",
                    local_path.display()
                )));
            }
            let raw = load_raw_settings(local_path)?;
            current = current.merge_with(&raw);
        }

        // 4. Environment variables
        current = Self::apply_env_overrides(current, env)?;

        current.expand_paths();
        validate_options(&current.selection)?;
        Ok(current)
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let base = &self.selection;
        let raw = &overlay.selection;
        Self {
            selection: SelectionOptions {
                p_threshold: raw.p_threshold.unwrap_or(base.p_threshold),
                correction_factor: raw.correction_factor.unwrap_or(base.correction_factor),
                pseudo_count: raw.pseudo_count.unwrap_or(base.pseudo_count),
                use_wgs_background: raw.use_wgs_background.unwrap_or(base.use_wgs_background),
                test_all_tiers: raw.test_all_tiers.unwrap_or(base.test_all_tiers),
                on_untested_parent: raw.on_untested_parent.unwrap_or(base.on_untested_parent),
            },
            background: BackgroundConfig {
                exome: overlay
                    .background
                    .exome
                    .clone()
                    .or_else(|| self.background.exome.clone()),
                genome: overlay
                    .background
                    .genome
                    .clone()
                    .or_else(|| self.background.genome.clone()),
            },
        }
    }

    /// Apply MUTSIEVE_* environment variables as explicit overrides.
    fn apply_env_overrides(
        mut settings: Self,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ApplicationError> {
        // Use config crate just for env var parsing
        let source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(env);
        let config = Config::builder()
            .add_source(source)
            .build()
            .map_err(config_err)?;

        let selection = &mut settings.selection;
        if let Some(val) = get_opt(config.get_float("selection.p_threshold"))? {
            selection.p_threshold = val;
        }
        if let Some(val) = get_opt(config.get_float("selection.correction_factor"))? {
            selection.correction_factor = val;
        }
        if let Some(val) = get_opt(config.get_float("selection.pseudo_count"))? {
            selection.pseudo_count = val;
        }
        if let Some(val) = get_opt(config.get_bool("selection.use_wgs_background"))? {
            selection.use_wgs_background = val;
        }
        if let Some(val) = get_opt(config.get_bool("selection.test_all_tiers"))? {
            selection.test_all_tiers = val;
        }
        if let Some(val) = get_opt(config.get_string("selection.on_untested_parent"))? {
            selection.on_untested_parent = parse_policy(&val)?;
        }
        if let Some(val) = get_opt(config.get_string("background.exome"))? {
            settings.background.exome = Some(PathBuf::from(val));
        }
        if let Some(val) = get_opt(config.get_string("background.genome"))? {
            settings.background.genome = Some(PathBuf::from(val));
        }

        Ok(settings)
    }

    /// Expand shell variables and tilde in background paths.
    fn expand_paths(&mut self) {
        self.background.exome = self.background.exome.as_deref().map(expand_path);
        self.background.genome = self.background.genome.as_deref().map(expand_path);
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# mutsieve configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/mutsieve/mutsieve.toml
#   Local:  file given with --config
#   Env:    MUTSIEVE_<SECTION>__<KEY>, e.g. MUTSIEVE_SELECTION__P_THRESHOLD=0.01

[selection]
# Significance level for corrected p-values (strict <)
# p_threshold = 0.05

# Fixed multiplicity correction applied to every p-value
# correction_factor = 150.0

# Added per feature as pseudo_count * leaf_span / 3
# pseudo_count = 0.0

# Use the genome background instead of the exome one
# use_wgs_background = false

# false: report significant tier-A classes only
# test_all_tiers = true

# Nodes below a non-surviving parent: "pass" or "exclude"
# on_untested_parent = "pass"

[background]
# Hierarchy CSV (feature,parent,leaf_span,background_prob) or rate CSV (context,rate)
# exome = "~/data/mutsieve/exome_background.csv"
# genome = "~/data/mutsieve/genome_background.csv"
"#
        .to_string()
    }
}

/// Missing keys are `None`; present but malformed keys are errors.
fn get_opt<T>(result: Result<T, ConfigError>) -> Result<Option<T>, ApplicationError> {
    match result {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

fn parse_policy(value: &str) -> Result<UntestedParentPolicy, ApplicationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pass" => Ok(UntestedParentPolicy::Pass),
        "exclude" => Ok(UntestedParentPolicy::Exclude),
        other => Err(ApplicationError::config(format!(
            "on_untested_parent must be pass or exclude, got {other}"
        ))),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
