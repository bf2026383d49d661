//! Tracing and logging setup shared by every binary and test harness.

/// Initialize process-wide tracing with JSON output.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize process-wide tracing with the given output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}

pub use crate::tracing::LogFormat;

/// Subscriber configuration (filter, formatter).
pub mod tracing;
