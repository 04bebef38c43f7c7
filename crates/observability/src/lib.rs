//! Tracing/logging setup shared by every binary.

pub mod environment;
pub mod logging;

pub use environment::{Environment, UnknownEnvironment};
pub use logging::{INTERNAL_TARGET, filter_directives};

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(environment: Environment) {
    logging::init(environment);
}
