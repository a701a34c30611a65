//! Query shape shared by every ledger backend.

use serde::{Deserialize, Serialize};
use strata_types::{Address, LedgerRecord};

/// Default records per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Ordering of results by ledger height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "HEIGHT_ASC")]
    HeightAsc,
    #[serde(rename = "HEIGHT_DESC")]
    HeightDesc,
}

/// Require tag `name` to equal one of `values`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub name: String,
    pub values: Vec<String>,
}

/// A tag-filtered, owner-restricted, height-ordered query.
///
/// A query always starts from the beginning of its ordering; continuation is
/// expressed separately with a [`Cursor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordQuery {
    pub tags: Vec<TagFilter>,
    pub owners: Option<Vec<Address>>,
    pub sort: SortOrder,
    pub page_size: usize,
}

impl RecordQuery {
    pub fn new(sort: SortOrder) -> Self {
        Self {
            tags: Vec::new(),
            owners: None,
            sort,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Require tag `name` to equal `value`.
    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(TagFilter {
            name: name.into(),
            values: vec![value.into()],
        });
        self
    }

    /// Restrict results to records signed by one of `owners`.
    pub fn owners(mut self, owners: impl IntoIterator<Item = Address>) -> Self {
        self.owners = Some(owners.into_iter().collect());
        self
    }

    /// Set the page size. Zero is clamped to one.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Whether `record` satisfies every tag filter.
    pub fn matches_tags(&self, record: &LedgerRecord) -> bool {
        self.tags.iter().all(|filter| {
            record
                .tag(&filter.name)
                .is_some_and(|v| filter.values.iter().any(|want| want == v))
        })
    }

    /// Whether `record` satisfies the owner restriction, if any.
    pub fn matches_owner(&self, record: &LedgerRecord) -> bool {
        self.owners
            .as_ref()
            .map_or(true, |owners| owners.contains(&record.owner))
    }

    pub fn matches(&self, record: &LedgerRecord) -> bool {
        self.matches_tags(record) && self.matches_owner(record)
    }
}

/// Opaque continuation token returned with a page.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of query results in the query's sort order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<LedgerRecord>,
    /// Cursor positioned after the last record, if the page is non-empty.
    pub end_cursor: Option<Cursor>,
}
