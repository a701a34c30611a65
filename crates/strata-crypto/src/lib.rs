//! Cryptographic primitives for Strata.
//!
//! Provides Ed25519 signing for ledger records (through [`Wallet`]) and the
//! SHA-256 content digests that name manifests and blobs.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod digest;
pub mod signer;
pub mod wallet;

pub use digest::ContentDigester;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
pub use wallet::{SignedRecord, Wallet, WalletError};
