use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::TypeError;
use crate::tags;

/// Identifier of an immutable ledger record.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxId(String);

impl TxId {
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() || value.contains('/') || value.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidTxId(value));
        }
        Ok(Self(value))
    }

    /// Derive the id of a record from its signature bytes.
    pub fn from_signature(signature: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"strata-tx-v1:");
        hasher.update(signature);
        Self(hex::encode(hasher.finalize().as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TxId> for String {
    fn from(id: TxId) -> Self {
        id.0
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single name/value tag, as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

/// The tag set of a record.
///
/// Gateways return tags as a list; Strata folds them into a map where a
/// repeated name keeps its last value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a wire tag list into a map.
    pub fn from_list(list: impl IntoIterator<Item = Tag>) -> Self {
        Self(list.into_iter().map(|t| (t.name, t.value)).collect())
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns `true` if the tag `name` is present with exactly `value`.
    pub fn matches(&self, name: &str, value: &str) -> bool {
        self.get(name) == Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The wire list form, ordered by tag name.
    pub fn to_list(&self) -> Vec<Tag> {
        self.0
            .iter()
            .map(|(name, value)| Tag {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

/// The `type` tag values Strata understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Organization authorization snapshot.
    Org,
    /// Tag pointer: tag name to content reference.
    Ref,
    /// Content blob or manifest body.
    Content,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Org => "org",
            Self::Ref => "ref",
            Self::Content => "content",
        }
    }
}

impl FromStr for RecordKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "org" => Ok(Self::Org),
            "ref" => Ok(Self::Ref),
            "content" => Ok(Self::Content),
            other => Err(TypeError::UnknownRecordKind(other.to_string())),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger entry as seen by a reader.
///
/// Records are totally ordered by `(height, sequence)`. Records that a gateway
/// reports without a block yet are given [`LedgerRecord::PENDING_HEIGHT`] so
/// they sort after everything final.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: TxId,
    pub owner: Address,
    pub height: u64,
    pub sequence: u64,
    pub tags: Tags,
    pub data_size: u64,
}

impl LedgerRecord {
    pub const PENDING_HEIGHT: u64 = u64::MAX;

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name)
    }

    /// The record's `type` tag, if it is one Strata understands.
    pub fn kind(&self) -> Option<RecordKind> {
        self.tag(tags::TYPE).and_then(|t| t.parse().ok())
    }

    /// Sort key for ledger order.
    pub fn position(&self) -> (u64, u64) {
        (self.height, self.sequence)
    }

    pub fn is_pending(&self) -> bool {
        self.height == Self::PENDING_HEIGHT
    }
}
