use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use strata_crypto::SignedRecord;
use strata_types::TxId;

use crate::error::LedgerResult;
use crate::query::{Cursor, Page, RecordQuery};

/// Read boundary: tag-filtered, paginated queries.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Fetch one page of `query`, starting after `after` (or from the
    /// beginning of the ordering when `None`).
    ///
    /// An empty page is a valid answer, not an error.
    async fn query_page(&self, query: &RecordQuery, after: Option<&Cursor>) -> LedgerResult<Page>;
}

/// Write boundary: submission of signed records.
///
/// A successful submission means the ledger accepted the record, not that
/// readers can see it yet.
#[async_trait]
pub trait LedgerSubmit: Send + Sync {
    /// Submit a record with its whole body in one request.
    async fn submit_record(&self, record: &SignedRecord, body: Bytes) -> LedgerResult<TxId>;

    /// Submit a record whose body is streamed from `body` in `chunk_size`
    /// pieces.
    async fn submit_chunked(
        &self,
        record: &SignedRecord,
        body: &Path,
        chunk_size: usize,
    ) -> LedgerResult<TxId>;
}
