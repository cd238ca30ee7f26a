//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// navoctree::core::logging::init();
/// log::info!("Navmesh service started");
/// ```
pub fn init() {
    // Tests and binaries may both call this; only the first one wins.
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    )
    .format_timestamp_millis()
    .try_init();
}
