use std::sync::Arc;

use bytes::Bytes;
use strata_crypto::ContentDigester;
use strata_types::{Address, Digest, TxId};

use crate::cache::{CacheKey, ConsistencyCache};
use crate::context::RegistryContext;
use crate::error::{RegistryError, RegistryResult};
use crate::index::{ContentIndex, Locator};
use crate::names::Reference;
use crate::org::{Organization, OrganizationResolver};
use crate::staging::UploadStaging;
use crate::writer::{ContentPayload, WritePath};

/// Manifest media type used when neither the body nor the request says.
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// The registry as seen by a protocol front end.
///
/// Owns one of each component, all sharing a [`RegistryContext`] and a
/// [`ConsistencyCache`].
#[derive(Debug)]
pub struct Registry {
    ctx: RegistryContext,
    resolver: OrganizationResolver,
    index: ContentIndex,
    writer: Arc<WritePath>,
    cache: ConsistencyCache,
    staging: UploadStaging,
}

impl Registry {
    pub fn new(ctx: RegistryContext) -> Self {
        let cache = ConsistencyCache::from_config(&ctx.config);
        let writer = Arc::new(WritePath::new(ctx.clone()));
        let staging = UploadStaging::new(
            ctx.config.upload_dir.clone(),
            ctx.config.upload_idle_timeout(),
            cache.clone(),
            writer.clone(),
        );
        Self {
            resolver: OrganizationResolver::new(ctx.clone()),
            index: ContentIndex::new(ctx.clone()),
            ctx,
            writer,
            cache,
            staging,
        }
    }

    pub fn context(&self) -> &RegistryContext {
        &self.ctx
    }

    pub fn identity(&self) -> &Address {
        self.ctx.identity()
    }

    pub fn index(&self) -> &ContentIndex {
        &self.index
    }

    pub fn writer(&self) -> &WritePath {
        &self.writer
    }

    pub fn cache(&self) -> &ConsistencyCache {
        &self.cache
    }

    pub fn staging(&self) -> &UploadStaging {
        &self.staging
    }

    pub async fn organization(&self, name: &str) -> RegistryResult<Organization> {
        self.resolver.resolve(name).await
    }

    /// Like [`organization`](Self::organization), but an organization with
    /// no history is [`RegistryError::NotFound`].
    pub async fn existing_organization(&self, name: &str) -> RegistryResult<Organization> {
        let org = self.resolver.resolve(name).await?;
        if !org.exists {
            return Err(RegistryError::NotFound(format!("organization {name:?}")));
        }
        Ok(org)
    }

    pub async fn update_organization(
        &self,
        name: &str,
        authorized_users: Vec<Address>,
        homepage: Option<&str>,
    ) -> RegistryResult<TxId> {
        self.writer
            .propose_organization_update(name, authorized_users, homepage)
            .await
    }

    /// Whether a blob should be reported as present: in flight or recently
    /// committed here, or resolvable on the ledger.
    pub async fn blob_exists(
        &self,
        org: &str,
        artifact: &str,
        digest: &Digest,
    ) -> RegistryResult<bool> {
        let key = CacheKey::new(org, artifact, digest.clone());
        if self.cache.contains(&key).await {
            return Ok(true);
        }
        Ok(self.index.resolve_location(org, artifact, digest).await?.is_some())
    }

    pub async fn locate_blob(
        &self,
        org: &str,
        artifact: &str,
        digest: &Digest,
    ) -> RegistryResult<Option<Locator>> {
        self.index.resolve_location(org, artifact, digest).await
    }

    /// The digest a manifest reference stands for, if it exists.
    pub async fn manifest_digest(
        &self,
        org: &str,
        artifact: &str,
        reference: &Reference,
    ) -> RegistryResult<Option<Digest>> {
        match reference {
            Reference::Tag(tag) => self.index.resolve_tag(org, artifact, tag).await,
            Reference::Digest(digest) => Ok(self
                .blob_exists(org, artifact, digest)
                .await?
                .then(|| digest.clone())),
        }
    }

    /// Where a manifest's body can be fetched.
    pub async fn locate_manifest(
        &self,
        org: &str,
        artifact: &str,
        reference: &Reference,
    ) -> RegistryResult<Option<Locator>> {
        let digest = match reference {
            Reference::Digest(digest) => digest.clone(),
            Reference::Tag(tag) => match self.index.resolve_tag(org, artifact, tag).await? {
                Some(digest) => digest,
                None => return Ok(None),
            },
        };
        self.index.resolve_location(org, artifact, &digest).await
    }

    /// Store a manifest and, for a tag reference, point the tag at it.
    ///
    /// Returns the manifest digest. A digest reference must match the body.
    #[tracing::instrument(skip(self, body, content_type), fields(size = body.len()))]
    pub async fn push_manifest(
        &self,
        org: &str,
        artifact: &str,
        reference: &Reference,
        body: Bytes,
        content_type: Option<&str>,
    ) -> RegistryResult<Digest> {
        let digest = ContentDigester::digest(&body);
        if let Reference::Digest(declared) = reference {
            if declared != &digest {
                return Err(RegistryError::InvalidDigest(format!(
                    "manifest hashes to {digest}, not {declared}"
                )));
            }
        }

        let media_type = manifest_media_type(&body, content_type);
        let id = self
            .writer
            .publish_content_blob(org, artifact, &digest, ContentPayload::inline(media_type, body))
            .await?;
        self.cache
            .mark_committed(CacheKey::new(org, artifact, digest.clone()), id)
            .await;

        if let Reference::Tag(tag) = reference {
            self.writer
                .publish_tag_pointer(org, artifact, tag, &digest)
                .await?;
        }
        Ok(digest)
    }
}

/// Media type of a manifest: its own `mediaType` field, else the request's
/// content type, else the OCI image manifest type.
pub fn manifest_media_type(body: &[u8], content_type: Option<&str>) -> String {
    #[derive(serde::Deserialize)]
    struct MediaType {
        #[serde(rename = "mediaType")]
        media_type: Option<String>,
    }

    serde_json::from_slice::<MediaType>(body)
        .ok()
        .and_then(|m| m.media_type)
        .filter(|m| !m.is_empty())
        .or_else(|| content_type.filter(|c| !c.is_empty()).map(str::to_string))
        .unwrap_or_else(|| OCI_MANIFEST.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use strata_crypto::Wallet;
    use strata_ledger::InMemoryLedger;
    use strata_types::tags;

    use super::*;
    use crate::config::RegistryConfig;

    const EMPTY_OBJECT_DIGEST: &str =
        "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";

    struct Fixture {
        _dir: tempfile::TempDir,
        ledger: Arc<InMemoryLedger>,
        registry: Registry,
    }

    async fn fixture(ttl_secs: u64, deferred: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let ledger = InMemoryLedger::new();
        let ledger = Arc::new(if deferred { ledger.with_deferred_finality() } else { ledger });
        let config = RegistryConfig {
            application_name: "strata-test".into(),
            upload_dir: dir.path().to_path_buf(),
            cache_ttl_secs: ttl_secs,
            ..RegistryConfig::default()
        };
        let ctx = RegistryContext::in_memory(config, Wallet::generate(), ledger.clone());
        let registry = Registry::new(ctx);
        registry.update_organization("acme", vec![], None).await.unwrap();
        ledger.confirm_pending();
        Fixture {
            _dir: dir,
            ledger,
            registry,
        }
    }

    #[test]
    fn media_type_fallbacks() {
        let docker = r#"{"mediaType":"application/vnd.docker.distribution.manifest.v2+json"}"#;
        assert_eq!(
            manifest_media_type(docker.as_bytes(), Some("application/json")),
            "application/vnd.docker.distribution.manifest.v2+json"
        );
        assert_eq!(
            manifest_media_type(b"{}", Some("application/vnd.oci.image.index.v1+json")),
            "application/vnd.oci.image.index.v1+json"
        );
        assert_eq!(manifest_media_type(b"not json", None), OCI_MANIFEST);
        assert_eq!(manifest_media_type(b"{}", Some("")), OCI_MANIFEST);
    }

    #[tokio::test]
    async fn missing_organization_is_not_found() {
        let f = fixture(300, false).await;
        assert!(f.registry.existing_organization("acme").await.unwrap().exists);
        let err = f.registry.existing_organization("nobody").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(ref what) if what.contains("nobody")));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn pushed_manifest_resolves_by_tag_and_digest() {
        let f = fixture(300, false).await;
        let reference = Reference::parse("latest").unwrap();
        let digest = f
            .registry
            .push_manifest("acme", "web", &reference, Bytes::from_static(b"{}"), None)
            .await
            .unwrap();
        assert_eq!(digest.to_string(), EMPTY_OBJECT_DIGEST);

        let by_tag = f.registry.manifest_digest("acme", "web", &reference).await.unwrap();
        assert_eq!(by_tag, Some(digest.clone()));

        let by_digest = Reference::Digest(digest.clone());
        assert_eq!(
            f.registry.manifest_digest("acme", "web", &by_digest).await.unwrap(),
            Some(digest.clone())
        );

        let locator = f
            .registry
            .locate_manifest("acme", "web", &reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(f.ledger.body(&locator.tx_id).unwrap(), Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn push_by_digest_skips_tag_pointer() {
        let f = fixture(300, false).await;
        let before = f.ledger.len();
        let reference = Reference::parse(EMPTY_OBJECT_DIGEST).unwrap();
        f.registry
            .push_manifest("acme", "web", &reference, Bytes::from_static(b"{}"), None)
            .await
            .unwrap();
        assert_eq!(f.ledger.len(), before + 1);

        let wrong = Reference::Digest(Digest::from_sha256([0; 32]));
        let err = f
            .registry
            .push_manifest("acme", "web", &wrong, Bytes::from_static(b"{}"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDigest(_)));
    }

    #[tokio::test]
    async fn cache_bridges_until_expiry_then_ledger_decides() {
        let f = fixture(1, true).await;
        let digest = ContentDigester::digest(b"abc");

        let handle = f
            .registry
            .staging()
            .monolithic("acme", "web", b"abc", digest.clone())
            .await
            .unwrap();
        assert!(f.registry.blob_exists("acme", "web", &digest).await.unwrap());

        handle.wait().await.unwrap();
        assert_eq!(f.ledger.pending_len(), 1);
        assert!(f.registry.blob_exists("acme", "web", &digest).await.unwrap());

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(!f.registry.blob_exists("acme", "web", &digest).await.unwrap());

        f.ledger.confirm_pending();
        assert!(f.registry.blob_exists("acme", "web", &digest).await.unwrap());
    }

    #[tokio::test]
    async fn tag_resolution_is_monotonic_without_writes() {
        let f = fixture(300, false).await;
        let reference = Reference::parse("v1").unwrap();
        f.registry
            .push_manifest("acme", "web", &reference, Bytes::from_static(b"{\"v\":1}"), None)
            .await
            .unwrap();

        let first = f.registry.manifest_digest("acme", "web", &reference).await.unwrap();
        // unauthorized writes are not "intervening authorized writes"
        f.ledger.insert_record(
            Address::new("mallory").unwrap(),
            strata_types::Tags::new()
                .with(tags::APP, "strata-test")
                .with(tags::TYPE, "ref")
                .with(tags::ORG, "acme")
                .with(tags::ARTIFACT, "web")
                .with(tags::TAG_NAME, "v1")
                .with(tags::REFERENCE, Digest::from_sha256([9; 32]).to_string()),
        );
        let second = f.registry.manifest_digest("acme", "web", &reference).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_references_are_absent() {
        let f = fixture(300, false).await;
        let tag = Reference::parse("missing").unwrap();
        assert_eq!(f.registry.manifest_digest("acme", "web", &tag).await.unwrap(), None);
        assert_eq!(f.registry.locate_manifest("acme", "web", &tag).await.unwrap(), None);
        let digest = Digest::from_sha256([3; 32]);
        assert!(!f.registry.blob_exists("acme", "web", &digest).await.unwrap());
        assert!(f.registry.locate_blob("acme", "web", &digest).await.unwrap().is_none());
    }
}
