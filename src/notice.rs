//! Progress/diagnostic logging, kept off stdout so `qreceive` can stay
//! machine-parseable there.

/// Initialise the global `tracing` subscriber for a binary.
///
/// `verbose` raises the default filter to `debug`; `quiet` lowers it to
/// `warn`. Neither flag overrides an explicit `RUST_LOG`.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[macro_export]
macro_rules! notice {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! warn_notice {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error_notice {
    ($($arg:tt)*) => {
        tracing::error!($($arg)*)
    };
}
