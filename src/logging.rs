//! Log output for the CLI.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Filter directive for a verbosity level. `RUST_LOG` takes precedence.
pub fn default_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbosity {
        0 => "mdspeak=info",
        1 => "mdspeak=debug",
        _ => "mdspeak=trace",
    }
}

/// Install a stderr subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(verbosity: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity, quiet)));

    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity > 1),
        )
        .with(filter)
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
