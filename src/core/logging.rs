//! Logging initialization and utilities

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g.
/// `RUST_LOG=imagefield::streaming=debug` to follow LOD activity.
///
/// # Example
/// ```
/// imagefield::core::logging::init();
/// log::info!("Viewer started");
/// ```
pub fn init() {
    // try_init so repeated calls (tests, embedding apps) do not panic
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
