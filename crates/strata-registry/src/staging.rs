//! Upload sessions and background finalization.
//!
//! A session moves through `initiated -> accumulating -> finalizing` and
//! ends committed or abandoned. Bytes accumulate in a scratch file named
//! after the session id. Finalizing marks the digest in flight in the
//! [`ConsistencyCache`], then hands publication to a background task and
//! returns at once. The caller never learns the outcome: failures are
//! logged and the cache entry is dropped.
//!
//! Sessions left idle longer than the configured timeout are evicted and
//! their scratch files deleted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::notification::RemovalCause;
use strata_crypto::ContentDigester;
use strata_types::{Digest, TxId};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cache::{CacheKey, ConsistencyCache};
use crate::error::{RegistryError, RegistryResult};
use crate::names::{validate_artifact_name, validate_org_name};
use crate::writer::{ContentPayload, WritePath, OCTET_STREAM};

/// One in-progress upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSession {
    pub id: Uuid,
    pub org: String,
    pub artifact: String,
    pub path: PathBuf,
    /// Bytes accumulated so far.
    pub size: u64,
}

impl UploadSession {
    /// Inclusive byte range received so far, as reported in `Range` headers.
    pub fn range(&self) -> String {
        format!("0-{}", self.size.saturating_sub(1))
    }
}

/// Handle on a background publication.
///
/// Dropping it detaches the task; request handlers do exactly that.
#[derive(Debug)]
pub struct FinalizeHandle {
    digest: Digest,
    task: JoinHandle<RegistryResult<TxId>>,
}

impl FinalizeHandle {
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Wait for the background publication to finish.
    pub async fn wait(self) -> RegistryResult<TxId> {
        self.task.await.map_err(|e| RegistryError::Finalization {
            digest: self.digest,
            reason: e.to_string(),
        })?
    }
}

/// Tracks upload sessions and their scratch files.
pub struct UploadStaging {
    dir: PathBuf,
    sessions: Cache<Uuid, UploadSession>,
    cache: ConsistencyCache,
    writer: Arc<WritePath>,
}

impl UploadStaging {
    pub fn new(
        dir: impl Into<PathBuf>,
        idle_timeout: Duration,
        cache: ConsistencyCache,
        writer: Arc<WritePath>,
    ) -> Self {
        let sessions = Cache::builder()
            .time_to_idle(idle_timeout)
            .eviction_listener(|id: Arc<Uuid>, session: UploadSession, cause| {
                // explicit removals hand the file to finalize or cancel
                if cause == RemovalCause::Expired {
                    tracing::debug!(%id, size = session.size, "idle upload expired");
                    discard_scratch(&session.path);
                }
            })
            .build();
        Self {
            dir: dir.into(),
            sessions,
            cache,
            writer,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn active_sessions(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }

    /// Expire idle sessions now instead of lazily.
    pub async fn run_pending_tasks(&self) {
        self.sessions.run_pending_tasks().await;
    }

    /// Start a session with an empty scratch file.
    pub async fn initiate(&self, org: &str, artifact: &str) -> RegistryResult<UploadSession> {
        validate_org_name(org)?;
        validate_artifact_name(artifact)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let id = Uuid::new_v4();
        let path = self.dir.join(id.simple().to_string());
        tokio::fs::File::create(&path).await?;

        let session = UploadSession {
            id,
            org: org.to_string(),
            artifact: artifact.to_string(),
            path,
            size: 0,
        };
        self.sessions.insert(id, session.clone()).await;
        tracing::debug!(%id, org, artifact, "upload initiated");
        Ok(session)
    }

    /// Append bytes to a session. Returns the updated session.
    pub async fn append(
        &self,
        org: &str,
        artifact: &str,
        id: &str,
        bytes: &[u8],
    ) -> RegistryResult<UploadSession> {
        let mut session = self.status(org, artifact, id).await?;

        let mut file = match tokio::fs::OpenOptions::new()
            .append(true)
            .open(&session.path)
            .await
        {
            Ok(file) => file,
            // expired between lookup and open
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::UploadUnknown(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;
        session.size = file.metadata().await?.len();

        self.sessions.insert(session.id, session.clone()).await;
        Ok(session)
    }

    /// Look up a session belonging to `org/artifact`.
    pub async fn status(
        &self,
        org: &str,
        artifact: &str,
        id: &str,
    ) -> RegistryResult<UploadSession> {
        let unknown = || RegistryError::UploadUnknown(id.to_string());
        let uuid = Uuid::parse_str(id).map_err(|_| unknown())?;
        let session = self.sessions.get(&uuid).await.ok_or_else(unknown)?;
        if session.org != org || session.artifact != artifact {
            return Err(unknown());
        }
        Ok(session)
    }

    /// Abandon a session and delete its scratch file.
    pub async fn cancel(&self, org: &str, artifact: &str, id: &str) -> RegistryResult<()> {
        let session = self.status(org, artifact, id).await?;
        self.sessions.remove(&session.id).await;
        remove_scratch(&session.path).await;
        tracing::debug!(id = %session.id, "upload cancelled");
        Ok(())
    }

    /// Append any final bytes, then publish in the background.
    ///
    /// On return the digest is already visible to existence checks through
    /// the consistency cache. The returned handle may be dropped.
    pub async fn finalize(
        &self,
        org: &str,
        artifact: &str,
        id: &str,
        final_bytes: &[u8],
        digest: Digest,
    ) -> RegistryResult<FinalizeHandle> {
        let session = if final_bytes.is_empty() {
            self.status(org, artifact, id).await?
        } else {
            self.append(org, artifact, id, final_bytes).await?
        };
        self.sessions.remove(&session.id).await;

        let key = CacheKey::new(org, artifact, digest.clone());
        self.cache.mark_in_flight(key.clone()).await;
        tracing::info!(id = %session.id, %digest, size = session.size, "upload finalizing");

        let writer = self.writer.clone();
        let cache = self.cache.clone();
        let task_digest = digest.clone();
        let task = tokio::spawn(async move {
            let result = publish(&writer, &session, &task_digest).await;
            match &result {
                Ok(tx_id) => {
                    tracing::info!(%tx_id, digest = %task_digest, "upload committed");
                    cache.mark_committed(key, tx_id.clone()).await;
                }
                Err(e) => {
                    tracing::error!(
                        digest = %task_digest,
                        org = %session.org,
                        artifact = %session.artifact,
                        error = %e,
                        "upload finalization failed",
                    );
                    cache.invalidate(&key).await;
                }
            }
            remove_scratch(&session.path).await;
            result.map_err(|e| RegistryError::Finalization {
                digest: task_digest,
                reason: e.to_string(),
            })
        });

        Ok(FinalizeHandle { digest, task })
    }

    /// Initiate and finalize in one step.
    pub async fn monolithic(
        &self,
        org: &str,
        artifact: &str,
        body: &[u8],
        digest: Digest,
    ) -> RegistryResult<FinalizeHandle> {
        let session = self.initiate(org, artifact).await?;
        self.finalize(org, artifact, &session.id.to_string(), body, digest)
            .await
    }
}

async fn publish(
    writer: &WritePath,
    session: &UploadSession,
    declared: &Digest,
) -> RegistryResult<TxId> {
    let path = session.path.clone();
    let (computed, _) =
        tokio::task::spawn_blocking(move || ContentDigester::digest_file(&path))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;
    if &computed != declared {
        return Err(RegistryError::DigestMismatch {
            declared: declared.clone(),
            computed,
        });
    }

    writer
        .publish_content_blob(
            &session.org,
            &session.artifact,
            declared,
            ContentPayload::file(OCTET_STREAM, session.path.clone()),
        )
        .await
}

async fn remove_scratch(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch file");
        }
    }
}

fn discard_scratch(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch file");
        }
    }
}

impl std::fmt::Debug for UploadStaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadStaging")
            .field("dir", &self.dir)
            .field("sessions", &self.sessions.entry_count())
            .finish()
    }
}
