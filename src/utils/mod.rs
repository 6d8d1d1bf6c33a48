//! Utility functions

use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor an explicit level is given
pub const DEFAULT_LOG_FILTER: &str = "kolosal_experiment=info";

/// Install a `fmt` subscriber for the experiment's logs.
///
/// `RUST_LOG` wins over `level`. A subscriber that is already installed is
/// kept, so calling this more than once is harmless.
pub fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
