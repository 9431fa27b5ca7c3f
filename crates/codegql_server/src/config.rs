//! Server configuration.
//!
//! Values are layered: defaults, then `CODEGQL_*` environment variables, then
//! command-line flags.

use codegql_core::DEFAULT_MAX_PAGE_SIZE;
use codegql_resolvers::SchemaSettings;
use std::net::SocketAddr;
use thiserror::Error;

pub const ENV_HOST: &str = "CODEGQL_HOST";
pub const ENV_PORT: &str = "CODEGQL_PORT";
pub const ENV_TEAMS_ENABLED: &str = "CODEGQL_TEAMS_ENABLED";
pub const ENV_DOTCOM_MODE: &str = "CODEGQL_DOTCOM_MODE";
pub const ENV_MAX_PAGE_SIZE: &str = "CODEGQL_MAX_PAGE_SIZE";
pub const ENV_EXTERNAL_URL: &str = "CODEGQL_EXTERNAL_URL";
pub const ENV_TRUST_INTERNAL_HEADER: &str = "CODEGQL_TRUST_INTERNAL_HEADER";
pub const ENV_MAX_BODY_BYTES: &str = "CODEGQL_MAX_BODY_BYTES";

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),

    #[error("max page size must be positive")]
    ZeroPageSize,

    #[error("max body size must be positive")]
    ZeroBodyLimit,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Serve a usage page at `GET /graphql`.
    pub playground: bool,
    pub max_page_size: usize,
    pub teams_enabled: bool,
    pub dotcom_mode: bool,
    /// Base URL for absolute links. Defaults to the listen address.
    pub external_url: Option<String>,
    /// Honour `X-Actor-Internal`. Only for deployments behind a trusted proxy.
    pub trust_internal_header: bool,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_num<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3080,
            playground: true,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            teams_enabled: true,
            dotcom_mode: false,
            external_url: None,
            trust_internal_header: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new().with_lookup(|var| std::env::var(var).ok())
    }

    /// Applies variables found by `lookup` on top of `self`.
    pub fn with_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = parse_num(ENV_PORT, &port)?;
        }
        if let Some(enabled) = lookup(ENV_TEAMS_ENABLED) {
            self.teams_enabled = parse_bool(ENV_TEAMS_ENABLED, &enabled)?;
        }
        if let Some(dotcom) = lookup(ENV_DOTCOM_MODE) {
            self.dotcom_mode = parse_bool(ENV_DOTCOM_MODE, &dotcom)?;
        }
        if let Some(size) = lookup(ENV_MAX_PAGE_SIZE) {
            self.max_page_size = parse_num(ENV_MAX_PAGE_SIZE, &size)?;
        }
        if let Some(url) = lookup(ENV_EXTERNAL_URL) {
            self.external_url = Some(url);
        }
        if let Some(trust) = lookup(ENV_TRUST_INTERNAL_HEADER) {
            self.trust_internal_header = parse_bool(ENV_TRUST_INTERNAL_HEADER, &trust)?;
        }
        if let Some(size) = lookup(ENV_MAX_BODY_BYTES) {
            self.max_body_bytes = parse_num(ENV_MAX_BODY_BYTES, &size)?;
        }
        self.validate()?;
        Ok(self)
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn no_playground(mut self) -> Self {
        self.playground = false;
        self
    }

    #[must_use]
    pub fn max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = max;
        self
    }

    #[must_use]
    pub fn teams_enabled(mut self, enabled: bool) -> Self {
        self.teams_enabled = enabled;
        self
    }

    #[must_use]
    pub fn dotcom_mode(mut self, dotcom: bool) -> Self {
        self.dotcom_mode = dotcom;
        self
    }

    #[must_use]
    pub fn external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn trust_internal_header(mut self, trust: bool) -> Self {
        self.trust_internal_header = trust;
        self
    }

    #[must_use]
    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::ZeroBodyLimit);
        }
        Ok(())
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }

    /// The resolver settings this configuration implies.
    pub fn schema_settings(&self) -> SchemaSettings {
        let external_url = self
            .external_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port));
        SchemaSettings::default()
            .teams_enabled(self.teams_enabled)
            .dotcom_mode(self.dotcom_mode)
            .max_page_size(self.max_page_size)
            .external_url(external_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_server_config() {
        let config = ServerConfig::new()
            .port(8080)
            .host("0.0.0.0")
            .no_playground();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert!(!config.playground);
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = ServerConfig::new()
            .with_lookup(env(&[
                (ENV_PORT, "4000"),
                (ENV_TEAMS_ENABLED, "off"),
                (ENV_DOTCOM_MODE, "TRUE"),
                (ENV_MAX_PAGE_SIZE, "50"),
                (ENV_TRUST_INTERNAL_HEADER, "yes"),
                (ENV_MAX_BODY_BYTES, "4096"),
            ]))
            .unwrap();
        assert!(config.trust_internal_header);
        assert_eq!(config.max_body_bytes, 4096);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert!(!config.teams_enabled);
        assert!(config.dotcom_mode);
        assert_eq!(config.max_page_size, 50);
    }

    #[test]
    fn test_invalid_env_names_the_variable() {
        let err = ServerConfig::new()
            .with_lookup(env(&[(ENV_TEAMS_ENABLED, "maybe")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"maybe\" for CODEGQL_TEAMS_ENABLED: expected a boolean"
        );

        let err = ServerConfig::new()
            .with_lookup(env(&[(ENV_PORT, "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_PORT, .. }));

        let err = ServerConfig::new()
            .with_lookup(env(&[(ENV_MAX_PAGE_SIZE, "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroPageSize);

        let err = ServerConfig::new()
            .with_lookup(env(&[(ENV_MAX_BODY_BYTES, "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroBodyLimit);
        assert!(!ServerConfig::new().trust_internal_header);
    }

    #[test]
    fn test_schema_settings_default_external_url() {
        let settings = ServerConfig::new().port(9000).schema_settings();
        assert_eq!(settings.external_url, "http://127.0.0.1:9000");
        assert!(settings.teams_enabled);

        let settings = ServerConfig::new()
            .external_url("https://code.acme.dev/")
            .schema_settings();
        assert_eq!(settings.external_url, "https://code.acme.dev");
    }

    #[test]
    fn test_invalid_host() {
        let err = ServerConfig::new().host("not a host").addr().unwrap_err();
        assert_eq!(err, ConfigError::InvalidAddress("not a host:3080".into()));
    }
}
