//! Signed writes: organization snapshots, tag pointers, and content bodies.
//!
//! Every write re-resolves the organization and refuses unless the signing
//! identity is a current member. A successful write returns the record id
//! once the ledger accepts it; readers may not see it until finality.

use std::path::PathBuf;

use bytes::Bytes;
use strata_crypto::ContentDigester;
use strata_types::{tags, Address, Digest, RecordKind, Tags, TxId};

use crate::context::RegistryContext;
use crate::error::{RegistryError, RegistryResult};
use crate::names::{validate_artifact_name, validate_tag_name};
use crate::org::{Organization, OrganizationResolver};

/// Media type for blobs of unknown type.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Body of a content record.
#[derive(Clone, Debug)]
pub enum PayloadBody {
    /// Bytes already in memory. Always submitted in one request.
    Inline(Bytes),
    /// A staged file. Submitted inline up to the configured limit, chunked
    /// beyond it.
    File(PathBuf),
}

#[derive(Clone, Debug)]
pub struct ContentPayload {
    pub media_type: String,
    pub body: PayloadBody,
}

impl ContentPayload {
    pub fn inline(media_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            body: PayloadBody::Inline(body.into()),
        }
    }

    pub fn file(media_type: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            media_type: media_type.into(),
            body: PayloadBody::File(path.into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WritePath {
    ctx: RegistryContext,
    resolver: OrganizationResolver,
}

impl WritePath {
    pub fn new(ctx: RegistryContext) -> Self {
        Self {
            resolver: OrganizationResolver::new(ctx.clone()),
            ctx,
        }
    }

    pub fn identity(&self) -> &Address {
        self.ctx.identity()
    }

    /// Publish a new authorized-user snapshot for `org`.
    ///
    /// When the organization has no history the caller founds it and is
    /// added to the set if missing. Otherwise the caller must already be a
    /// member. The record carries the complete set, not a delta, and the
    /// current homepage unless a new one is given.
    #[tracing::instrument(
        skip(self, authorized_users),
        fields(identity = %self.identity().short())
    )]
    pub async fn propose_organization_update(
        &self,
        org: &str,
        authorized_users: Vec<Address>,
        homepage: Option<&str>,
    ) -> RegistryResult<TxId> {
        let current = self.resolver.resolve(org).await?;
        let homepage = homepage.unwrap_or(&current.homepage).to_string();
        let identity = self.identity().clone();

        let mut users: Vec<Address> = Vec::with_capacity(authorized_users.len() + 1);
        if current.exists {
            self.require_member(&current)?;
        } else {
            tracing::info!(founder = %identity, "founding organization");
            users.push(identity);
        }
        for user in authorized_users {
            if !users.contains(&user) {
                users.push(user);
            }
        }

        let declared: Vec<&str> = users.iter().map(Address::as_str).collect();
        let declared = serde_json::Value::from(declared).to_string();
        let tags = self
            .ctx
            .tags(RecordKind::Org)
            .with(tags::ORG, org)
            .with(tags::AUTHORIZED_USERS, declared)
            .with(tags::HOMEPAGE, homepage);
        self.submit_empty(tags).await
    }

    /// Point `tag` at `reference`.
    #[tracing::instrument(skip(self), fields(reference = %reference))]
    pub async fn publish_tag_pointer(
        &self,
        org: &str,
        artifact: &str,
        tag: &str,
        reference: &Digest,
    ) -> RegistryResult<TxId> {
        validate_artifact_name(artifact)?;
        validate_tag_name(tag)?;
        let current = self.resolver.resolve(org).await?;
        self.require_member(&current)?;

        let tags = self
            .ctx
            .tags(RecordKind::Ref)
            .with(tags::ORG, org)
            .with(tags::ARTIFACT, artifact)
            .with(tags::TAG_NAME, tag)
            .with(tags::REFERENCE, reference.to_string());
        self.submit_empty(tags).await
    }

    /// Store a body under `reference`.
    #[tracing::instrument(
        skip(self, payload),
        fields(reference = %reference, media_type = %payload.media_type)
    )]
    pub async fn publish_content_blob(
        &self,
        org: &str,
        artifact: &str,
        reference: &Digest,
        payload: ContentPayload,
    ) -> RegistryResult<TxId> {
        validate_artifact_name(artifact)?;
        let current = self.resolver.resolve(org).await?;
        self.require_member(&current)?;

        let tags = self
            .ctx
            .tags(RecordKind::Content)
            .with(tags::CONTENT_TYPE, payload.media_type)
            .with(tags::ORG, org)
            .with(tags::ARTIFACT, artifact)
            .with(tags::REFERENCE, reference.to_string());

        let id = match payload.body {
            PayloadBody::Inline(body) => self.submit_inline(tags, body).await?,
            PayloadBody::File(path) => self.submit_file(tags, path).await?,
        };
        Ok(id)
    }

    fn require_member(&self, org: &Organization) -> RegistryResult<()> {
        let identity = self.identity();
        if org.is_authorized(identity) {
            return Ok(());
        }
        tracing::warn!(org = %org.name, %identity, "refusing write from non-member");
        Err(RegistryError::Unauthorized {
            org: org.name.clone(),
            identity: identity.clone(),
        })
    }

    async fn submit_empty(&self, tags: Tags) -> RegistryResult<TxId> {
        self.submit_inline(tags, Bytes::new()).await
    }

    async fn submit_inline(&self, tags: Tags, body: Bytes) -> RegistryResult<TxId> {
        let record = self
            .ctx
            .wallet
            .sign(tags, ContentDigester::digest(&body), body.len() as u64);
        let id = self.ctx.submit.submit_record(&record, body).await?;
        tracing::info!(%id, size = record.data_size, "record submitted");
        Ok(id)
    }

    async fn submit_file(&self, tags: Tags, path: PathBuf) -> RegistryResult<TxId> {
        let size = tokio::fs::metadata(&path).await?.len();
        if size <= self.ctx.config.inline_payload_limit {
            let body = tokio::fs::read(&path).await?;
            return self.submit_inline(tags, Bytes::from(body)).await;
        }

        let hashed = path.clone();
        let (digest, size) =
            tokio::task::spawn_blocking(move || ContentDigester::digest_file(&hashed))
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))??;
        let record = self.ctx.wallet.sign(tags, digest, size);
        let id = self
            .ctx
            .submit
            .submit_chunked(&record, &path, self.ctx.config.chunk_size)
            .await?;
        tracing::info!(%id, size, "chunked record submitted");
        Ok(id)
    }
}
