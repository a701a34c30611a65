//! Signing identity used for every record Strata submits.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_types::{Address, Digest, Tags, TxId};

use crate::signer::{Signature, SignatureError, SigningKey, VerifyingKey};

const RECORD_DOMAIN: &[u8] = b"strata-record-v1:";
const ANCHOR_LEN: usize = 16;

/// Errors from loading or saving a wallet.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("wallet I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed wallet file: {0}")]
    Format(String),
}

#[derive(Serialize, Deserialize)]
struct KeyFile {
    secret_key: String,
}

/// An Ed25519 key together with the ledger address it owns.
pub struct Wallet {
    key: SigningKey,
    address: Address,
}

impl Wallet {
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate())
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        let address = key.verifying_key().address();
        Self { key, address }
    }

    /// Load a JSON key file of the form `{"secret_key": "<hex>"}`.
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let raw = std::fs::read_to_string(path)?;
        let file: KeyFile =
            serde_json::from_str(&raw).map_err(|e| WalletError::Format(e.to_string()))?;
        let bytes: [u8; 32] = hex::decode(file.secret_key.trim())
            .map_err(|e| WalletError::Format(e.to_string()))?
            .try_into()
            .map_err(|_| WalletError::Format("secret key must be 32 bytes".into()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(bytes)))
    }

    /// Write the key file. Refuses to overwrite an existing file. On Unix the
    /// file is readable by its owner only.
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let file = KeyFile {
            secret_key: hex::encode(self.key.as_bytes()),
        };
        let json =
            serde_json::to_string_pretty(&file).map_err(|e| WalletError::Format(e.to_string()))?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
        let mut out = options.open(path)?;
        std::io::Write::write_all(&mut out, json.as_bytes())?;
        Ok(())
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Sign a record's tags and body commitment.
    pub fn sign(&self, tags: Tags, data_digest: Digest, data_size: u64) -> SignedRecord {
        let anchor = hex::encode(rand::random::<[u8; ANCHOR_LEN]>());
        let message = signing_message(&anchor, &tags, &data_digest, data_size);
        let signature = self.key.sign(&message);
        SignedRecord {
            id: TxId::from_signature(&signature.to_bytes()),
            owner: self.address.clone(),
            public_key: self.key.verifying_key().to_hex(),
            anchor,
            tags,
            data_digest,
            data_size,
            signature,
        }
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Wallet({})", self.address.short())
    }
}

/// A signed, not-yet-submitted ledger record.
///
/// The body itself travels separately (inline or chunked); the signature
/// commits to it through `data_digest` and `data_size`. The random `anchor`
/// keeps two records with identical tags and body from sharing an id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRecord {
    pub id: TxId,
    pub owner: Address,
    pub public_key: String,
    pub anchor: String,
    pub tags: Tags,
    pub data_digest: Digest,
    pub data_size: u64,
    pub signature: Signature,
}

impl SignedRecord {
    /// Check the signature, that the owner address belongs to the key, and
    /// that the id was derived from the signature.
    pub fn verify(&self) -> Result<(), SignatureError> {
        let key = VerifyingKey::from_hex(&self.public_key)?;
        if key.address() != self.owner {
            return Err(SignatureError::OwnerMismatch);
        }
        if TxId::from_signature(&self.signature.to_bytes()) != self.id {
            return Err(SignatureError::IdMismatch);
        }
        let message = signing_message(&self.anchor, &self.tags, &self.data_digest, self.data_size);
        key.verify(&message, &self.signature)
    }
}

fn signing_message(anchor: &str, tags: &Tags, data_digest: &Digest, data_size: u64) -> Vec<u8> {
    let mut message = RECORD_DOMAIN.to_vec();
    push_field(&mut message, anchor);
    message.extend_from_slice(&(tags.len() as u64).to_be_bytes());
    for (name, value) in tags.iter() {
        push_field(&mut message, name);
        push_field(&mut message, value);
    }
    push_field(&mut message, &data_digest.to_string());
    message.extend_from_slice(&data_size.to_be_bytes());
    message
}

fn push_field(buf: &mut Vec<u8>, field: &str) {
    buf.extend_from_slice(&(field.len() as u64).to_be_bytes());
    buf.extend_from_slice(field.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::ContentDigester;

    fn tags() -> Tags {
        Tags::new().with("app", "strata-test").with("type", "ref")
    }

    #[test]
    fn signed_record_verifies() {
        let wallet = Wallet::generate();
        let record = wallet.sign(tags(), ContentDigester::digest(b""), 0);
        assert_eq!(&record.owner, wallet.address());
        assert!(record.verify().is_ok());
    }

    #[test]
    fn tampered_tags_fail_verification() {
        let wallet = Wallet::generate();
        let mut record = wallet.sign(tags(), ContentDigester::digest(b""), 0);
        record.tags.insert("type", "org");
        assert_eq!(record.verify(), Err(SignatureError::InvalidSignature));
    }

    #[test]
    fn forged_owner_fails_verification() {
        let wallet = Wallet::generate();
        let mut record = wallet.sign(tags(), ContentDigester::digest(b""), 0);
        record.owner = Wallet::generate().address().clone();
        assert_eq!(record.verify(), Err(SignatureError::OwnerMismatch));
    }

    #[test]
    fn body_commitment_is_signed() {
        let wallet = Wallet::generate();
        let mut record = wallet.sign(tags(), ContentDigester::digest(b"abc"), 3);
        record.data_size = 4;
        assert!(record.verify().is_err());
    }

    #[test]
    fn identical_records_get_distinct_ids() {
        let wallet = Wallet::generate();
        let a = wallet.sign(tags(), ContentDigester::digest(b""), 0);
        let b = wallet.sign(tags(), ContentDigester::digest(b""), 0);
        assert_ne!(a.id, b.id);
        assert!(b.verify().is_ok());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let wallet = Wallet::generate();
        wallet.save(&path).unwrap();
        let loaded = Wallet::load(&path).unwrap();
        assert_eq!(wallet.address(), loaded.address());
        assert!(wallet.save(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn saved_key_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        Wallet::generate().save(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, r#"{"secret_key":"abcd"}"#).unwrap();
        assert!(matches!(Wallet::load(&path), Err(WalletError::Format(_))));
    }
}
