use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install the tracing subscriber once per process.
///
/// `RUST_LOG` wins when set. Otherwise testup logs warnings, or debug
/// events with `verbose`.
pub fn init_logging(verbose: bool) {
    INIT.call_once(|| {
        let default = if verbose { "testup=debug" } else { "testup=warn" };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        // Another subscriber may already be installed by the embedding binary.
        let _ = fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init();
    });
}
