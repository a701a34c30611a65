use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Signing identity of a ledger record's owner.
///
/// Addresses are opaque strings on the wire: the ledger reports them for every
/// record and organizations list them in their authorized-user set. Strata's
/// own wallets derive theirs from an Ed25519 public key with
/// [`Address::from_public_key`], but addresses read back from a gateway are
/// accepted as-is so long as they are non-empty and contain no whitespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Validate and wrap an address string.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidAddress(value));
        }
        Ok(Self(value))
    }

    /// Derive the address of an Ed25519 public key.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"strata-address-v1:");
        hasher.update(public_key);
        Self(hex::encode(hasher.finalize().as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl TryFrom<String> for Address {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::str::FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_public_key_is_deterministic() {
        let a = Address::from_public_key(&[7; 32]);
        let b = Address::from_public_key(&[7; 32]);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn different_keys_different_addresses() {
        assert_ne!(
            Address::from_public_key(&[1; 32]),
            Address::from_public_key(&[2; 32])
        );
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(Address::new("").is_err());
        assert!(Address::new("abc def").is_err());
        assert!(Address::new("vLRHFqCw1uHu75xqB4fCDW-QxpkpJxBtFD9g4QYUbfw").is_ok());
    }

    #[test]
    fn serializes_as_plain_string() {
        let a = Address::new("owner-1").unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"owner-1\"");
        let list: Vec<Address> = serde_json::from_str("[\"x\",\"y\"]").unwrap();
        assert_eq!(list.len(), 2);
        assert!(serde_json::from_str::<Address>("\"\"").is_err());
    }

    #[test]
    fn short_truncates() {
        let a = Address::new("abcdefghijkl").unwrap();
        assert_eq!(a.short(), "abcdefgh");
        let b = Address::new("abc").unwrap();
        assert_eq!(b.short(), "abc");
    }
}
