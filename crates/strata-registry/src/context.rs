use std::sync::Arc;

use strata_crypto::Wallet;
use strata_ledger::{
    HttpLedgerClient, InMemoryLedger, LedgerQuery, LedgerSubmit, RecordPager, RecordQuery,
    SortOrder,
};
use strata_types::{tags, Address, RecordKind, Tags};

use crate::config::RegistryConfig;
use crate::error::RegistryResult;

/// Everything a registry component needs: configuration, the signing
/// identity, and the two ledger capabilities.
///
/// Cheap to clone. Components receive one at construction instead of
/// reaching for process-wide state, so tests can run side by side with
/// distinct identities against a shared ledger.
#[derive(Clone)]
pub struct RegistryContext {
    pub config: Arc<RegistryConfig>,
    pub wallet: Arc<Wallet>,
    pub query: Arc<dyn LedgerQuery>,
    pub submit: Arc<dyn LedgerSubmit>,
}

impl RegistryContext {
    pub fn new(
        config: RegistryConfig,
        wallet: Wallet,
        query: Arc<dyn LedgerQuery>,
        submit: Arc<dyn LedgerSubmit>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            wallet: Arc::new(wallet),
            query,
            submit,
        }
    }

    /// Context backed by a gateway over HTTP.
    pub fn http(config: RegistryConfig, wallet: Wallet) -> RegistryResult<Self> {
        let client = Arc::new(HttpLedgerClient::new(config.http_ledger())?);
        Ok(Self::new(config, wallet, client.clone(), client))
    }

    /// Context backed by an in-memory ledger.
    pub fn in_memory(config: RegistryConfig, wallet: Wallet, ledger: Arc<InMemoryLedger>) -> Self {
        Self::new(config, wallet, ledger.clone(), ledger)
    }

    /// The same configuration and ledger with a different signing identity.
    pub fn with_wallet(&self, wallet: Wallet) -> Self {
        Self {
            wallet: Arc::new(wallet),
            ..self.clone()
        }
    }

    pub fn identity(&self) -> &Address {
        self.wallet.address()
    }

    /// Query over this application's records of one kind.
    pub(crate) fn query(&self, kind: RecordKind, sort: SortOrder) -> RecordQuery {
        RecordQuery::new(sort)
            .tag(tags::APP, self.config.application_name.clone())
            .tag(tags::TYPE, kind.as_str())
            .page_size(self.config.page_size())
    }

    /// Base tags for a record of one kind written by this application.
    pub(crate) fn tags(&self, kind: RecordKind) -> Tags {
        Tags::new()
            .with(tags::APP, self.config.application_name.clone())
            .with(tags::TYPE, kind.as_str())
    }

    pub(crate) fn pager(&self, query: RecordQuery) -> RecordPager<'_> {
        RecordPager::new(self.query.as_ref(), query).with_retry(self.config.retry.clone())
    }
}

impl std::fmt::Debug for RegistryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryContext")
            .field("application", &self.config.application_name)
            .field("identity", &self.wallet)
            .finish_non_exhaustive()
    }
}
