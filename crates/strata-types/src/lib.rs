//! Foundation types for Strata.
//!
//! Strata serves a container registry out of an append-only ledger. This crate
//! holds the vocabulary every other Strata crate shares.
//!
//! # Key Types
//!
//! - [`Address`]: Signing identity of a record's owner
//! - [`TxId`]: Immutable ledger record identifier
//! - [`Tags`]: Name/value tags attached to every record
//! - [`LedgerRecord`]: One height-ordered ledger entry as returned by queries
//! - [`RecordKind`]: The `type` tag values Strata writes (`org`, `ref`, `content`)
//! - [`Digest`]: Content reference (`sha256:<hex>`)

pub mod address;
pub mod digest;
pub mod error;
pub mod record;
pub mod tags;

pub use address::Address;
pub use digest::Digest;
pub use error::TypeError;
pub use record::{LedgerRecord, RecordKind, Tag, Tags, TxId};
