//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

/// Sparse mutational signatures: hierarchical binomial testing of mutation categories
#[derive(Parser, Debug)]
#[command(name = "mutsieve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file layered over the global one
    #[arg(short, long, global = true, env = "MUTSIEVE_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Select survival features per counts table
    Select {
        /// Counts tables (one column per trinucleotide context)
        #[arg(short = 'i', long = "counts", required = true, num_args = 1.., value_hint = ValueHint::FilePath)]
        counts: Vec<PathBuf>,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Also print the residual re-tests of the pruning phase
        #[arg(long)]
        residuals: bool,
    },

    /// Show the annotated count tree with survivors marked
    Tree {
        /// Counts table
        #[arg(short = 'i', long = "counts", value_hint = ValueHint::FilePath)]
        counts: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Build the 96-context hierarchy CSV from per-leaf rates
    Hierarchy {
        /// Rates table (context,rate)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        rates: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Overrides of the `[selection]` settings.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Background hierarchy or rate CSV, replacing the configured backgrounds
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub hierarchy: Option<PathBuf>,

    /// Use the whole-genome background
    #[arg(long)]
    pub wgs: bool,

    /// Pseudo count added as pseudo_count * leaf_span / 3
    #[arg(long)]
    pub pseudo_count: Option<f64>,

    /// Significance level for corrected p-values
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Fixed multiplicity correction factor
    #[arg(long)]
    pub correction: Option<f64>,

    /// Test the substitution classes only
    #[arg(long)]
    pub shallow: bool,

    /// Drop nodes below a non-surviving parent instead of passing them
    #[arg(long)]
    pub exclude_untested: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Show config file locations
    Path,
    /// Print a commented template config
    Template,
}
