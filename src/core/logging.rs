//! Logging setup for the command-line tools
//!
//! Library code only emits `log` records; binaries install the logger once.

/// Compile summaries and warnings, no per-node detail.
const DEFAULT_FILTER: &str = "info";

/// Install `env_logger` with the default filter. `RUST_LOG` overrides it.
///
/// # Example
/// ```
/// shapecodec::core::logging::init();
/// log::info!("Compiling map geometry");
/// ```
pub fn init() {
    init_with(DEFAULT_FILTER);
}

/// Install `env_logger` with `filter` unless `RUST_LOG` is set. Later calls
/// are ignored.
pub fn init_with(filter: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .try_init();
}
