use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid digest {value:?}: {reason}")]
    InvalidDigest { value: String, reason: String },

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("invalid record id: {0:?}")]
    InvalidTxId(String),

    #[error("unknown record kind: {0}")]
    UnknownRecordKind(String),
}
