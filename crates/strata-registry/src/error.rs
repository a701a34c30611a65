//! Error types for registry operations.

use strata_ledger::LedgerError;
use strata_types::{Address, Digest};
use thiserror::Error;

/// Errors that can occur while resolving or writing registry state.
///
/// Absence is not an error: lookups return `Ok(None)` when nothing matches
/// after exhausting the ledger. A ledger outage surfaces as
/// [`RegistryError::Ledger`] and must never be read as "not found".
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An organization, artifact, or tag name failed validation.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A digest reference could not be parsed, or did not match the content.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// The signing identity is not in the organization's authorized set.
    #[error("{identity} is not authorized to write to organization {org:?}")]
    Unauthorized { org: String, identity: Address },

    /// A required object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No upload session is tracked under this identifier.
    #[error("unknown upload session: {0}")]
    UploadUnknown(String),

    /// Staged bytes hash to a different digest than the client declared.
    #[error("digest mismatch: declared {declared}, computed {computed}")]
    DigestMismatch { declared: Digest, computed: Digest },

    /// Background publication of a finalized upload failed.
    #[error("finalization of {digest} failed: {reason}")]
    Finalization { digest: Digest, reason: String },

    /// The ledger client failed. Transient failures are retryable.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Scratch storage I/O failure.
    #[error("scratch storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Ledger(e) if e.is_transient())
    }
}

/// Convenience type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
