//! Subscriber initialization.
//!
//! JSON lines everywhere except development, where a human-readable format is
//! used. `RUST_LOG` controls the filter (default `info`).

use tracing_subscriber::EnvFilter;

use crate::Environment;

/// Target used for unexpected-error logs meant for operators only.
pub const INTERNAL_TARGET: &str = "learnhub::internal";

/// Filter directives for `environment`, starting from the `RUST_LOG` value (if any).
pub fn filter_directives(environment: Environment, rust_log: Option<&str>) -> String {
    let base = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("info");
    if environment.is_production_like() {
        format!("{base},{INTERNAL_TARGET}=off")
    } else {
        base.to_string()
    }
}

pub(crate) fn init(environment: Environment) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = filter_directives(environment, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match environment {
        Environment::Development => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .try_init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init(),
    };
    // A second call finds a global subscriber already installed.
    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_silences_internal_target() {
        let d = filter_directives(Environment::Production, None);
        assert_eq!(d, "info,learnhub::internal=off");
    }

    #[test]
    fn development_keeps_rust_log_verbatim() {
        let d = filter_directives(Environment::Development, Some("debug,hyper=warn"));
        assert_eq!(d, "debug,hyper=warn");
    }

    #[test]
    fn blank_rust_log_falls_back_to_info() {
        assert_eq!(filter_directives(Environment::Staging, Some("  ")), "info,learnhub::internal=off");
    }

    #[test]
    fn init_twice_is_a_no_op() {
        crate::init(Environment::Test);
        crate::init(Environment::Test);
    }
}
