//! Process-wide tracing/logging setup.

pub mod tracing;

pub use tracing::LogFormat;

/// Initialize logging with the format named by `ROOMSTOCK_LOG_FORMAT`
/// (JSON unless it says `pretty`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let format = std::env::var("ROOMSTOCK_LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default();
    tracing::init(format);
}
