//! Tests for argument parsing and command execution

mod common;

use std::path::PathBuf;

use clap::Parser;
use rstest::rstest;
use tempfile::TempDir;

use common::{counts_csv, rates_csv, write_file};
use mutsieve::cli::args::ConfigCommands;
use mutsieve::cli::{execute_command, Cli, CliError, Commands};
use mutsieve::exitcode;

#[test]
fn given_select_with_several_tables_when_parsing_then_collects_all() {
    // Act
    let cli = Cli::try_parse_from([
        "mutsieve", "-dd", "select", "-i", "a.csv", "b.csv", "--threshold", "0.01", "--wgs",
        "--exclude-untested", "--residuals",
    ])
    .unwrap();

    // Assert
    assert_eq!(cli.debug, 2);
    match cli.command {
        Some(Commands::Select {
            counts,
            selection,
            residuals,
        }) => {
            assert_eq!(counts, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
            assert_eq!(selection.threshold, Some(0.01));
            assert!(selection.wgs);
            assert!(selection.exclude_untested);
            assert!(!selection.shallow);
            assert!(residuals);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn given_select_without_counts_when_parsing_then_rejected() {
    assert!(Cli::try_parse_from(["mutsieve", "select"]).is_err());
}

#[rstest]
#[case(&["mutsieve", "tree", "-i", "c.csv", "--shallow", "--pseudo-count", "1"])]
#[case(&["mutsieve", "hierarchy", "-r", "rates.csv", "-o", "out.csv"])]
#[case(&["mutsieve", "config", "template"])]
#[case(&["mutsieve", "completion", "bash"])]
fn given_valid_subcommand_when_parsing_then_accepted(#[case] args: &[&str]) {
    assert!(Cli::try_parse_from(args).is_ok());
}

#[test]
fn given_global_config_flag_after_subcommand_when_parsing_then_applies() {
    // Act
    let cli = Cli::try_parse_from(["mutsieve", "config", "show", "-c", "local.toml"]).unwrap();

    // Assert
    assert_eq!(cli.config, Some(PathBuf::from("local.toml")));
    assert!(matches!(
        cli.command,
        Some(Commands::Config {
            command: ConfigCommands::Show
        })
    ));
}

#[test]
fn given_no_command_when_executing_then_usage_error() {
    // Arrange
    let cli = Cli::try_parse_from(["mutsieve"]).unwrap();

    // Act
    let err = execute_command(&cli).unwrap_err();

    // Assert
    assert!(matches!(err, CliError::Usage(_)));
    assert_eq!(err.exit_code(), exitcode::USAGE);
}

#[test]
fn given_rates_when_running_hierarchy_then_writes_csv() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let config = write_file(&temp, "mutsieve.toml", "");
    let rates = write_file(&temp, "rates.csv", &rates_csv(&[]));
    let output = temp.path().join("out").join("hierarchy.csv");
    let cli = Cli::try_parse_from([
        "mutsieve",
        "-c",
        config.to_str().unwrap(),
        "hierarchy",
        "-r",
        rates.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ])
    .unwrap();

    // Act
    execute_command(&cli).unwrap();

    // Assert
    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("feature,parent,leaf_span,background_prob"));
    assert_eq!(written.lines().count(), 1 + 1 + 6 + 24 + 96);
}

#[test]
fn given_counts_and_override_when_running_select_then_succeeds() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let config = write_file(&temp, "mutsieve.toml", "[selection]\non_untested_parent = \"exclude\"\n");
    let rates = write_file(&temp, "rates.csv", &rates_csv(&[]));
    let mut row = vec![100; 96];
    row[0] = 2100;
    let counts = write_file(&temp, "counts.csv", &counts_csv(&[("s1", row)]));
    let cli = Cli::try_parse_from([
        "mutsieve",
        "-c",
        config.to_str().unwrap(),
        "select",
        "-i",
        counts.to_str().unwrap(),
        "--hierarchy",
        rates.to_str().unwrap(),
        "--residuals",
    ])
    .unwrap();

    // Act & Assert
    execute_command(&cli).unwrap();
}

#[test]
fn given_missing_counts_file_when_running_select_then_noinput() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let config = write_file(&temp, "mutsieve.toml", "");
    let rates = write_file(&temp, "rates.csv", &rates_csv(&[]));
    let absent = temp.path().join("absent.csv");
    let cli = Cli::try_parse_from([
        "mutsieve",
        "-c",
        config.to_str().unwrap(),
        "select",
        "-i",
        absent.to_str().unwrap(),
        "--hierarchy",
        rates.to_str().unwrap(),
    ])
    .unwrap();

    // Act
    let err = execute_command(&cli).unwrap_err();

    // Assert
    assert_eq!(err.exit_code(), exitcode::NOINPUT);
}

#[test]
fn given_missing_config_file_when_running_then_config_exit_code() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let absent = temp.path().join("absent.toml");
    let cli = Cli::try_parse_from(["mutsieve", "-c", absent.to_str().unwrap(), "config", "show"]).unwrap();

    // Act
    let err = execute_command(&cli).unwrap_err();

    // Assert
    assert_eq!(err.exit_code(), exitcode::CONFIG);
}
