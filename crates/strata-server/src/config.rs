use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_registry::RegistryConfig;

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Key file for the signing identity. Required to serve.
    pub wallet_file: Option<PathBuf>,
    /// Largest request body accepted, in bytes.
    pub max_body_size: usize,
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            wallet_file: None,
            max_body_size: 512 * 1024 * 1024,
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from an optional TOML file, then apply `STRATA_*` environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Apply overrides from `lookup`, which maps a variable name to its
    /// value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        if let Some(v) = lookup("STRATA_APPLICATION_NAME") {
            self.registry.application_name = v;
        }
        if let Some(v) = lookup("STRATA_WALLET_FILE") {
            self.wallet_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("STRATA_GATEWAY") {
            self.registry.gateway_url = v;
        }
        if let Some(v) = lookup("STRATA_GRAPHQL_ENDPOINT") {
            self.registry.graphql_endpoint = v;
        }
        if let Some(v) = lookup("STRATA_PAGE_SIZE") {
            self.registry.page_size = parse("STRATA_PAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("STRATA_UPLOAD_DIR") {
            self.registry.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("STRATA_CACHE_TTL_SECS") {
            self.registry.cache_ttl_secs = parse("STRATA_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("STRATA_UPLOAD_IDLE_SECS") {
            self.registry.upload_idle_secs = parse("STRATA_UPLOAD_IDLE_SECS", &v)?;
        }
        if let Some(v) = lookup("STRATA_BIND_ADDR") {
            self.bind_addr = parse("STRATA_BIND_ADDR", &v)?;
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> ServerResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ServerError::Config(format!("{name}={value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_body_size, 512 * 1024 * 1024);
        assert!(c.wallet_file.is_none());
        assert_eq!(c.registry.application_name, "strata-dev");
    }

    #[test]
    fn toml_with_nested_registry() {
        let c = ServerConfig::from_toml(
            r#"
            bind_addr = "0.0.0.0:8080"
            wallet_file = "/etc/strata/wallet.json"

            [registry]
            application_name = "strata-prod"
            page_size = 50
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.wallet_file, Some(PathBuf::from("/etc/strata/wallet.json")));
        assert_eq!(c.registry.application_name, "strata-prod");
        assert_eq!(c.registry.page_size, 50);
        assert_eq!(c.registry.cache_ttl_secs, 300);
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("STRATA_APPLICATION_NAME", "from-env"),
            ("STRATA_GATEWAY", "http://localhost:1984/"),
            ("STRATA_PAGE_SIZE", "10"),
            ("STRATA_CACHE_TTL_SECS", "30"),
            ("STRATA_BIND_ADDR", "127.0.0.1:6000"),
        ]
        .into_iter()
        .collect();
        let mut c = ServerConfig::default();
        c.apply_env(|name| env.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(c.registry.application_name, "from-env");
        assert_eq!(c.registry.gateway_url, "http://localhost:1984/");
        assert_eq!(c.registry.page_size, 10);
        assert_eq!(c.registry.cache_ttl_secs, 30);
        assert_eq!(c.bind_addr.port(), 6000);
    }

    #[test]
    fn bad_env_value_is_a_config_error() {
        let mut c = ServerConfig::default();
        let err = c
            .apply_env(|name| (name == "STRATA_PAGE_SIZE").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(ref m) if m.contains("STRATA_PAGE_SIZE")));
    }
}
