//! Tag and content lookups restricted to an organization's authorized writers.
//!
//! Every lookup resolves the organization first, so authorization is as
//! fresh as the ledger. The owner restriction is applied twice: sent to the
//! ledger as a query filter, and re-checked here on every returned record
//! together with the `org` tag.

use strata_ledger::{RecordQuery, SortOrder};
use strata_types::{tags, Digest, LedgerRecord, RecordKind, TxId};

use crate::context::RegistryContext;
use crate::error::RegistryResult;
use crate::names::{validate_artifact_name, validate_tag_name};
use crate::org::{Organization, OrganizationResolver};

/// Where a content body can be fetched from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Locator {
    pub tx_id: TxId,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct ContentIndex {
    ctx: RegistryContext,
    resolver: OrganizationResolver,
}

impl ContentIndex {
    pub fn new(ctx: RegistryContext) -> Self {
        Self {
            resolver: OrganizationResolver::new(ctx.clone()),
            ctx,
        }
    }

    /// The content reference a tag currently points at.
    ///
    /// Only the newest authorized pointer counts. If its reference is
    /// missing or malformed the tag is absent; older pointers are never
    /// consulted.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_tag(
        &self,
        org: &str,
        artifact: &str,
        tag: &str,
    ) -> RegistryResult<Option<Digest>> {
        validate_artifact_name(artifact)?;
        validate_tag_name(tag)?;
        let organization = self.resolver.resolve(org).await?;

        let query = self
            .ctx
            .query(RecordKind::Ref, SortOrder::HeightDesc)
            .tag(tags::ORG, org)
            .tag(tags::ARTIFACT, artifact)
            .tag(tags::TAG_NAME, tag);

        let newest = self
            .newest_authorized(&organization, query, |record| Some(record.clone()))
            .await?;
        Ok(newest.and_then(|record| {
            let value = record.tag(tags::REFERENCE).unwrap_or_default();
            match Digest::parse(value) {
                Ok(digest) => Some(digest),
                Err(e) => {
                    tracing::warn!(
                        id = %record.id,
                        error = %e,
                        "newest tag pointer has a malformed reference",
                    );
                    None
                }
            }
        }))
    }

    /// Where the newest authorized body for a content reference lives.
    #[tracing::instrument(skip(self), fields(digest = %digest))]
    pub async fn resolve_location(
        &self,
        org: &str,
        artifact: &str,
        digest: &Digest,
    ) -> RegistryResult<Option<Locator>> {
        validate_artifact_name(artifact)?;
        let organization = self.resolver.resolve(org).await?;

        let query = self
            .ctx
            .query(RecordKind::Content, SortOrder::HeightDesc)
            .tag(tags::ORG, org)
            .tag(tags::ARTIFACT, artifact)
            .tag(tags::REFERENCE, digest.to_string());

        self.newest_authorized(&organization, query, |record| {
            Some(Locator {
                url: self.ctx.config.locator_url(&record.id),
                tx_id: record.id.clone(),
            })
        })
        .await
    }

    /// Walk `query` newest first and return the first authorized record that
    /// `accept` maps to a value.
    ///
    /// Stops early on a hit; otherwise pages until the ledger returns a short
    /// page. A page with no authorized match says nothing about the next one.
    async fn newest_authorized<T>(
        &self,
        org: &Organization,
        query: RecordQuery,
        accept: impl Fn(&LedgerRecord) -> Option<T>,
    ) -> RegistryResult<Option<T>> {
        if org.authorized_users.is_empty() {
            return Ok(None);
        }

        let query = query.owners(org.authorized_users.iter().cloned());
        let mut pager = self.ctx.pager(query);
        while let Some(page) = pager.next_page().await? {
            let found = page
                .iter()
                .filter(|record| {
                    org.is_authorized(&record.owner)
                        && record.tag(tags::ORG) == Some(org.name.as_str())
                        && pager.query().matches_tags(record)
                })
                .find_map(&accept);
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }
}
