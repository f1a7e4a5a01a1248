use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "rki_report=info";

/// Initializes console logging to stderr. `RUST_LOG` overrides the default
/// level; `verbose` raises this crate to debug.
pub fn init_logging(verbose: bool) {
    let directive = if verbose { "rki_report=debug" } else { DEFAULT_DIRECTIVE };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
