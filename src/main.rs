use clap::Parser;
use mutsieve::cli::{execute_command, output, Cli};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.debug);

    if let Err(e) = execute_command(&cli) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

/// `-d` count picks the level for mutsieve; RUST_LOG, when set, wins.
fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,mutsieve={level}")));

    // rayon worker chatter
    let quiet = filter_fn(|metadata| !metadata.target().starts_with("rayon"));

    // Logs go to stderr, results to stdout
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .with_span_events(if verbosity > 2 {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .with_filter(quiet)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(fmt_layer).init();
    tracing::debug!(verbosity, "logging initialised");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
