//! Process configuration, read once at startup from environment variables.

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

use learnhub_learning::ReorderPolicy;
use learnhub_observability::Environment;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("JWT_SECRET must be set when APP_ENV={0}")]
    MissingSecret(Environment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub environment: Environment,
    pub reorder_policy: ReorderPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get("APP_ENV") {
            Some(raw) => raw.parse::<Environment>().map_err(|e| ConfigError::Invalid {
                var: "APP_ENV",
                message: e.to_string(),
            })?,
            None => Environment::default(),
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "BIND_ADDR",
                message: e.to_string(),
            })?;

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production_like() => return Err(ConfigError::MissingSecret(environment)),
            None => DEV_JWT_SECRET.to_string(),
        };

        let reorder_policy = match get("REORDER_POLICY") {
            Some(raw) => raw.parse::<ReorderPolicy>().map_err(|e| ConfigError::Invalid {
                var: "REORDER_POLICY",
                message: e.to_string(),
            })?,
            None => ReorderPolicy::default(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url: get("DATABASE_URL"),
            environment,
            reorder_policy,
        })
    }

    /// Startup warnings about this configuration.
    ///
    /// Returned rather than logged so the caller can emit them once the
    /// subscriber is installed, which needs `environment` from this config.
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.jwt_secret == DEV_JWT_SECRET {
            warnings.push("JWT_SECRET not set; using insecure dev default");
        }
        warnings
    }

    /// Configuration for tests: in-memory store, loopback ephemeral port.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            environment: Environment::Test,
            reorder_policy: ReorderPolicy::Loose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.reorder_policy, ReorderPolicy::Loose);
    }

    #[test]
    fn dev_secret_fallback_is_reported_as_a_warning() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.warnings(), vec!["JWT_SECRET not set; using insecure dev default"]);

        let cfg = config(&[("JWT_SECRET", "s3cr3t")]).unwrap();
        assert!(cfg.warnings().is_empty());
    }

    #[test]
    fn production_requires_a_secret() {
        assert_eq!(
            config(&[("APP_ENV", "production")]),
            Err(ConfigError::MissingSecret(Environment::Production))
        );
        let cfg = config(&[("APP_ENV", "production"), ("JWT_SECRET", "s3cr3t")]).unwrap();
        assert_eq!(cfg.jwt_secret, "s3cr3t");
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config(&[("REORDER_POLICY", "sometimes")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "REORDER_POLICY", .. }));

        let err = config(&[("BIND_ADDR", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "BIND_ADDR", .. }));
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let cfg = config(&[("DATABASE_URL", "  "), ("REORDER_POLICY", "strict")]).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.reorder_policy, ReorderPolicy::Strict);
    }
}
