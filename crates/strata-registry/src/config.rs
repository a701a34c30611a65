//! Registry configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_ledger::{HttpLedgerConfig, RetryConfig};
use strata_types::TxId;

/// Configuration for the registry core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Value of the `app` tag on every record this registry reads or writes.
    pub application_name: String,
    /// Gateway base URL. Locators are `<gateway_url><tx id>`.
    pub gateway_url: String,
    pub graphql_endpoint: String,
    /// Records requested per ledger page.
    pub page_size: usize,
    /// Scratch directory for in-progress uploads.
    pub upload_dir: PathBuf,
    /// Uploads untouched for this long are discarded.
    pub upload_idle_secs: u64,
    /// How long a finalized upload counts as present before the ledger
    /// confirms it.
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    /// Bodies up to this size are submitted in one request.
    pub inline_payload_limit: u64,
    pub chunk_size: usize,
    pub retry: RetryConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            application_name: "strata-dev".into(),
            gateway_url: "https://arweave.net/".into(),
            graphql_endpoint: "https://arweave.net/graphql".into(),
            page_size: strata_ledger::query::DEFAULT_PAGE_SIZE,
            upload_dir: std::env::temp_dir().join("strata-uploads"),
            upload_idle_secs: 900,
            cache_ttl_secs: 300,
            cache_capacity: 10_000,
            inline_payload_limit: 256 * 1024,
            chunk_size: strata_ledger::chunk::DEFAULT_CHUNK_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub fn page_size(&self) -> usize {
        self.page_size.max(1)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn upload_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_idle_secs.max(1))
    }

    /// Retrieval URL for a record's body.
    pub fn locator_url(&self, id: &TxId) -> String {
        format!("{}/{}", self.gateway_url.trim_end_matches('/'), id)
    }

    pub fn http_ledger(&self) -> HttpLedgerConfig {
        HttpLedgerConfig::new(self.graphql_endpoint.clone(), self.gateway_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.application_name, "strata-dev");
        assert_eq!(config.page_size(), 100);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.upload_idle_timeout(), Duration::from_secs(900));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn locator_joins_gateway_and_id() {
        let id = TxId::new("abc123").unwrap();
        let mut config = RegistryConfig::default();
        assert_eq!(config.locator_url(&id), "https://arweave.net/abc123");
        config.gateway_url = "http://localhost:1984".into();
        assert_eq!(config.locator_url(&id), "http://localhost:1984/abc123");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{"page_size": 0, "cache_ttl_secs": 5}"#).unwrap();
        assert_eq!(config.page_size(), 1);
        assert_eq!(config.cache_ttl_secs, 5);
        assert_eq!(config.gateway_url, "https://arweave.net/");
    }
}
