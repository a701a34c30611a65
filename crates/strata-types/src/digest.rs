use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const SHA256_PREFIX: &str = "sha256:";
const SHA256_HEX_LEN: usize = 64;

/// Content reference in the registry's `<algorithm>:<hex>` form.
///
/// Only `sha256` is accepted, with exactly 64 lowercase hex characters. The
/// digest is the stable key for manifests and blobs regardless of where the
/// ledger ends up storing them.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    hex: String,
}

impl Digest {
    /// Wrap a raw SHA-256 output.
    pub fn from_sha256(hash: [u8; 32]) -> Self {
        Self {
            hex: hex::encode(hash),
        }
    }

    /// Parse a `sha256:<hex>` string.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let Some((algorithm, hex_part)) = value.split_once(':') else {
            return Err(TypeError::InvalidDigest {
                value: value.to_string(),
                reason: "missing algorithm prefix".into(),
            });
        };
        if algorithm != "sha256" {
            return Err(TypeError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        if hex_part.len() != SHA256_HEX_LEN {
            return Err(TypeError::InvalidDigest {
                value: value.to_string(),
                reason: format!("expected {SHA256_HEX_LEN} hex characters, got {}", hex_part.len()),
            });
        }
        if !hex_part
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(TypeError::InvalidDigest {
                value: value.to_string(),
                reason: "digest must be lowercase hex".into(),
            });
        }
        Ok(Self {
            hex: hex_part.to_string(),
        })
    }

    /// Returns `true` if `value` looks like a digest rather than a tag name.
    ///
    /// Tags cannot contain `:`, so anything with an algorithm separator is
    /// treated as a digest reference (and then fully validated by [`parse`]).
    ///
    /// [`parse`]: Digest::parse
    pub fn is_digest_like(value: &str) -> bool {
        value.contains(':')
    }

    pub fn algorithm(&self) -> &'static str {
        "sha256"
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// First twelve hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.hex[..12]
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_string()
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({SHA256_PREFIX}{})", self.short())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SHA256_PREFIX}{}", self.hex)
    }
}
