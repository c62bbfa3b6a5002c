use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::{validate_options, ApplicationError};
use crate::cli::args::{Cli, Commands, ConfigCommands, SelectionArgs};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, Settings};
use crate::domain::{CountsTable, Hierarchy, Selection, SelectionOptions, UntestedParentPolicy};
use crate::infrastructure::tables::hierarchy_to_csv;
use crate::infrastructure::ServiceContainer;
use crate::tree_traits::TreeNodeConvert;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Select {
            counts,
            selection,
            residuals,
        }) => _select(cli, counts, selection, *residuals),
        Some(Commands::Tree { counts, selection }) => _tree(cli, counts, selection),
        Some(Commands::Hierarchy { rates, output }) => _hierarchy(cli, rates, output.as_deref()),
        Some(Commands::Config { command }) => _config(cli, command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see mutsieve --help".to_string(),
        )),
    }
}

/// Settings with the command line flags applied on top.
pub fn selection_options(settings: &Settings, args: &SelectionArgs) -> CliResult<SelectionOptions> {
    let mut options = settings.selection;
    if let Some(threshold) = args.threshold {
        options.p_threshold = threshold;
    }
    if let Some(correction) = args.correction {
        options.correction_factor = correction;
    }
    if let Some(pseudo_count) = args.pseudo_count {
        options.pseudo_count = pseudo_count;
    }
    if args.wgs {
        options.use_wgs_background = true;
    }
    if args.shallow {
        options.test_all_tiers = false;
    }
    if args.exclude_untested {
        options.on_untested_parent = UntestedParentPolicy::Exclude;
    }
    validate_options(&options).map_err(|e| CliError::InvalidArgs(e.to_string()))?;
    Ok(options)
}

fn container(cli: &Cli) -> CliResult<ServiceContainer> {
    let settings = Settings::load(cli.config.as_deref())?;
    Ok(ServiceContainer::new(settings))
}

#[instrument(skip(cli, args))]
fn _select(cli: &Cli, counts: &[PathBuf], args: &SelectionArgs, residuals: bool) -> CliResult<()> {
    let container = container(cli)?;
    let options = selection_options(&container.settings, args)?;
    let service = container.signature_service(args.hierarchy.as_deref())?;

    let cohorts = counts
        .iter()
        .map(|path| {
            let table = container.tables().read_counts(path)?;
            Ok((path.display().to_string(), table))
        })
        .collect::<CliResult<Vec<(String, CountsTable)>>>()?;
    debug!("_select: {} cohorts", cohorts.len());

    let mut first_error: Option<ApplicationError> = None;
    for (name, result) in service.select_many(&cohorts, &options) {
        match result {
            Ok(selection) => print_selection(name, &selection, residuals),
            Err(e) => {
                output::error(&format!("{name}: {e}"));
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn print_selection(name: &str, selection: &Selection, residuals: bool) {
    output::cohort(name, selection.features().len());
    if selection.is_root_only() {
        output::warning(&format!("{name}: no feature beyond the total burden is significant"));
    }
    for feature in selection.features() {
        output::survivor(feature, selection.tree().get(feature).map(|n| n.tier));
    }
    if residuals {
        selection.trace().residuals.iter().for_each(output::residual);
    }
}

#[instrument(skip(cli, args))]
fn _tree(cli: &Cli, counts: &Path, args: &SelectionArgs) -> CliResult<()> {
    let container = container(cli)?;
    let options = selection_options(&container.settings, args)?;
    let service = container.signature_service(args.hierarchy.as_deref())?;
    let table = container.tables().read_counts(counts)?;

    let selection = service.select_survival_features(&table, &options)?;
    output::data(&selection.to_tree_string());
    Ok(())
}

#[instrument(skip(cli))]
fn _hierarchy(cli: &Cli, rates: &Path, output_path: Option<&Path>) -> CliResult<()> {
    let container = container(cli)?;
    let rates = container.tables().read_rates(rates)?;
    let hierarchy = Hierarchy::trinucleotide(&rates).map_err(ApplicationError::from)?;

    match output_path {
        Some(path) => {
            container.tables().write_hierarchy(path, &hierarchy)?;
            output::written(&path.display());
        }
        None => output::data(hierarchy_to_csv(&hierarchy)?.trim_end()),
    }
    Ok(())
}

fn _config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(cli.config.as_deref())?;
            output::data(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => {
                    let status = if path.exists() { "exists" } else { "not found" };
                    output::location("global", &format!("{} ({status})", path.display()));
                }
                None => output::warning("no config directory on this platform"),
            }
            if let Some(local) = &cli.config {
                let status = if local.exists() { "exists" } else { "not found" };
                output::location("local", &format!("{} ({status})", local.display()));
            }
        }
        ConfigCommands::Template => output::data(&Settings::template()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackgroundConfig;

    #[test]
    fn test_flags_override_settings() {
        let settings = Settings::default();
        let args = SelectionArgs {
            threshold: Some(0.01),
            pseudo_count: Some(1.0),
            shallow: true,
            exclude_untested: true,
            ..SelectionArgs::default()
        };

        let options = selection_options(&settings, &args).unwrap();

        assert_eq!(options.p_threshold, 0.01);
        assert_eq!(options.pseudo_count, 1.0);
        assert_eq!(options.correction_factor, 150.0);
        assert!(!options.test_all_tiers);
        assert_eq!(options.on_untested_parent, UntestedParentPolicy::Exclude);
    }

    #[test]
    fn test_invalid_flag_is_usage_error() {
        let args = SelectionArgs {
            threshold: Some(1.5),
            ..SelectionArgs::default()
        };
        let err = selection_options(&Settings::default(), &args).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgs(_)));
        assert_eq!(err.exit_code(), crate::exitcode::USAGE);
    }

    #[test]
    fn test_missing_exome_background_is_config_error() {
        let settings = Settings {
            background: BackgroundConfig::default(),
            ..Settings::default()
        };
        let container = ServiceContainer::new(settings);
        let err: CliError = container.signature_service(None).map(|_| ()).unwrap_err().into();
        assert_eq!(err.exit_code(), crate::exitcode::CONFIG);
    }
}
