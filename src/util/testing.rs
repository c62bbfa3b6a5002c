//! Logging for tests: call [`init_test_setup`] at the top of a test to see
//! selector traces with `cargo test -- --nocapture`.

use std::sync::Once;

use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

static TEST_SETUP: Once = Once::new();

/// Default filter when RUST_LOG is unset.
const TEST_FILTER: &str = "mutsieve=trace";

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(TEST_FILTER));
        // rayon and statrs internals drown the selector spans
        let quiet = filter_fn(|metadata| {
            !["rayon", "statrs"]
                .iter()
                .any(|name| metadata.target().starts_with(name))
        });

        let layer = fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(quiet)
            .with_filter(env_filter);

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            eprintln!("tracing subscriber already installed");
        }
        tracing::debug!("test logging ready");
    });
}
