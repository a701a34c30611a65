use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use strata_crypto::{ContentDigester, SignedRecord};
use strata_types::{Address, LedgerRecord, Tags, TxId};

use crate::chunk::ChunkReader;
use crate::error::{LedgerError, LedgerResult};
use crate::query::{Cursor, Page, RecordQuery, SortOrder};
use crate::traits::{LedgerQuery, LedgerSubmit};

/// In-memory ledger for tests, local demos, and embedding.
///
/// Every mined record gets a fresh height. With deferred finality enabled,
/// submissions wait in a pending pool, invisible to queries, until
/// [`confirm_pending`](Self::confirm_pending) mines them together into a
/// single block.
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
    deferred_finality: AtomicBool,
    honor_owner_filter: AtomicBool,
    failing_queries: AtomicUsize,
    /// Queries left before the armed failure, plus one. Zero when disarmed.
    failure_countdown: AtomicUsize,
}

#[derive(Default)]
struct LedgerState {
    records: Vec<LedgerRecord>,
    pending: Vec<LedgerRecord>,
    bodies: HashMap<TxId, Bytes>,
    height: u64,
    synthetic: u64,
}

impl LedgerState {
    fn mine(&mut self, mut batch: Vec<LedgerRecord>) {
        if batch.is_empty() {
            return;
        }
        self.height += 1;
        for (sequence, record) in batch.iter_mut().enumerate() {
            record.height = self.height;
            record.sequence = sequence as u64;
        }
        self.records.extend(batch);
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
            deferred_finality: AtomicBool::new(false),
            honor_owner_filter: AtomicBool::new(true),
            failing_queries: AtomicUsize::new(0),
            failure_countdown: AtomicUsize::new(0),
        }
    }

    /// Hold submissions as pending until [`confirm_pending`](Self::confirm_pending).
    pub fn with_deferred_finality(self) -> Self {
        self.deferred_finality.store(true, Ordering::SeqCst);
        self
    }

    /// Mine all pending submissions into one block. Returns how many.
    pub fn confirm_pending(&self) -> usize {
        let Ok(mut state) = self.inner.write() else {
            return 0;
        };
        let batch = std::mem::take(&mut state.pending);
        let count = batch.len();
        state.mine(batch);
        count
    }

    /// Mine an unsigned record directly, bypassing submission checks.
    ///
    /// Lets tests build arbitrary histories, including records from owners
    /// that hold no key.
    pub fn insert_record(&self, owner: Address, tags: Tags) -> LedgerRecord {
        let mut state = match self.inner.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.synthetic += 1;
        state.height += 1;
        let record = LedgerRecord {
            id: TxId::from_signature(&state.synthetic.to_be_bytes()),
            owner,
            height: state.height,
            sequence: 0,
            tags,
            data_size: 0,
        };
        state.records.push(record.clone());
        record
    }

    /// Make the next `count` queries fail with a transient error.
    pub fn fail_next_queries(&self, count: usize) {
        self.failing_queries.store(count, Ordering::SeqCst);
    }

    /// Answer the next `successes` queries normally, then fail one with a
    /// transient error. Lets a walk fail after it has seen full pages.
    pub fn fail_after(&self, successes: usize) {
        self.failure_countdown.store(successes + 1, Ordering::SeqCst);
    }

    /// Stop enforcing owner restrictions, like a misbehaving query service.
    pub fn ignore_owner_filter(&self) {
        self.honor_owner_filter.store(false, Ordering::SeqCst);
    }

    /// Body of a mined or pending record.
    pub fn body(&self, id: &TxId) -> Option<Bytes> {
        self.inner.read().ok()?.bodies.get(id).cloned()
    }

    /// Number of mined records.
    pub fn len(&self) -> usize {
        self.inner.read().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.inner.read().map(|s| s.pending.len()).unwrap_or(0)
    }

    fn accept(&self, record: &SignedRecord, body: Bytes) -> LedgerResult<TxId> {
        record
            .verify()
            .map_err(|e| LedgerError::Rejected(e.to_string()))?;
        let size_ok = body.len() as u64 == record.data_size;
        if !size_ok || !ContentDigester::verify(&body, &record.data_digest) {
            return Err(LedgerError::Rejected(
                "body does not match the signed digest".into(),
            ));
        }

        let mut state = self
            .inner
            .write()
            .map_err(|_| LedgerError::Unavailable("ledger write lock poisoned".into()))?;
        if state.bodies.contains_key(&record.id) {
            return Err(LedgerError::Rejected(format!(
                "record {} already submitted",
                record.id
            )));
        }

        let mined = LedgerRecord {
            id: record.id.clone(),
            owner: record.owner.clone(),
            height: LedgerRecord::PENDING_HEIGHT,
            sequence: 0,
            tags: record.tags.clone(),
            data_size: record.data_size,
        };
        state.bodies.insert(record.id.clone(), body);
        if self.deferred_finality.load(Ordering::SeqCst) {
            state.pending.push(mined);
        } else {
            state.mine(vec![mined]);
        }
        Ok(record.id.clone())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_cursor(record: &LedgerRecord) -> Cursor {
    Cursor::new(format!("{}:{}", record.height, record.sequence))
}

fn decode_cursor(cursor: &Cursor) -> LedgerResult<(u64, u64)> {
    let (height, sequence) = cursor
        .as_str()
        .split_once(':')
        .ok_or_else(|| LedgerError::Decode(format!("bad cursor {:?}", cursor.as_str())))?;
    let parse = |v: &str| {
        v.parse::<u64>()
            .map_err(|_| LedgerError::Decode(format!("bad cursor {:?}", cursor.as_str())))
    };
    Ok((parse(height)?, parse(sequence)?))
}

#[async_trait]
impl LedgerQuery for InMemoryLedger {
    async fn query_page(&self, query: &RecordQuery, after: Option<&Cursor>) -> LedgerResult<Page> {
        let injected = self
            .failing_queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        let countdown = self
            .failure_countdown
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() || countdown == Ok(1) {
            return Err(LedgerError::Unavailable("injected query failure".into()));
        }

        let after = after.map(decode_cursor).transpose()?;
        let honor_owners = self.honor_owner_filter.load(Ordering::SeqCst);
        let state = self
            .inner
            .read()
            .map_err(|_| LedgerError::Unavailable("ledger read lock poisoned".into()))?;

        let mut matching: Vec<&LedgerRecord> = state
            .records
            .iter()
            .filter(|r| query.matches_tags(r) && (!honor_owners || query.matches_owner(r)))
            .collect();
        matching.sort_by_key(|r| r.position());
        if query.sort == SortOrder::HeightDesc {
            matching.reverse();
        }

        let records: Vec<LedgerRecord> = matching
            .into_iter()
            .filter(|r| match (after, query.sort) {
                (None, _) => true,
                (Some(pos), SortOrder::HeightAsc) => r.position() > pos,
                (Some(pos), SortOrder::HeightDesc) => r.position() < pos,
            })
            .take(query.page_size)
            .cloned()
            .collect();

        Ok(Page {
            end_cursor: records.last().map(encode_cursor),
            records,
        })
    }
}

#[async_trait]
impl LedgerSubmit for InMemoryLedger {
    async fn submit_record(&self, record: &SignedRecord, body: Bytes) -> LedgerResult<TxId> {
        self.accept(record, body)
    }

    async fn submit_chunked(
        &self,
        record: &SignedRecord,
        body: &Path,
        chunk_size: usize,
    ) -> LedgerResult<TxId> {
        let mut reader = ChunkReader::open(body, chunk_size).await?;
        let mut assembled = BytesMut::with_capacity(reader.total_size() as usize);
        while let Some(chunk) = reader.next_chunk().await? {
            if chunk.offset != assembled.len() as u64 {
                return Err(LedgerError::Rejected("chunk out of order".into()));
            }
            assembled.extend_from_slice(&chunk.data);
        }
        self.accept(record, assembled.freeze())
    }
}

#[cfg(test)]
mod tests {
    use strata_crypto::Wallet;

    use super::*;

    fn tags(kind: &str) -> Tags {
        Tags::new().with("app", "test").with("type", kind)
    }

    fn signed(wallet: &Wallet, kind: &str, body: &[u8]) -> SignedRecord {
        wallet.sign(tags(kind), ContentDigester::digest(body), body.len() as u64)
    }

    #[tokio::test]
    async fn submitted_records_are_queryable() {
        let ledger = InMemoryLedger::new();
        let wallet = Wallet::generate();
        let record = signed(&wallet, "ref", b"");
        let id = ledger.submit_record(&record, Bytes::new()).await.unwrap();
        assert_eq!(id, record.id);

        let page = ledger
            .query_page(&RecordQuery::new(SortOrder::HeightAsc).tag("type", "ref"), None)
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(&page.records[0].owner, wallet.address());
        assert!(!page.records[0].is_pending());
    }

    #[tokio::test]
    async fn rejects_bad_signature_and_body() {
        let ledger = InMemoryLedger::new();
        let wallet = Wallet::generate();

        let mut forged = signed(&wallet, "org", b"");
        forged.tags.insert("org", "acme");
        assert!(matches!(
            ledger.submit_record(&forged, Bytes::new()).await,
            Err(LedgerError::Rejected(_))
        ));

        let record = signed(&wallet, "content", b"abc");
        assert!(matches!(
            ledger.submit_record(&record, Bytes::from_static(b"abd")).await,
            Err(LedgerError::Rejected(_))
        ));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn deferred_finality_hides_pending_records() {
        let ledger = InMemoryLedger::new().with_deferred_finality();
        let wallet = Wallet::generate();
        ledger
            .submit_record(&signed(&wallet, "ref", b""), Bytes::new())
            .await
            .unwrap();

        let query = RecordQuery::new(SortOrder::HeightAsc).tag("type", "ref");
        assert!(ledger.query_page(&query, None).await.unwrap().records.is_empty());
        assert_eq!(ledger.pending_len(), 1);

        assert_eq!(ledger.confirm_pending(), 1);
        assert_eq!(ledger.query_page(&query, None).await.unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn chunked_submission_reassembles_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        let body = vec![9u8; 1000];
        std::fs::write(&path, &body).unwrap();

        let ledger = InMemoryLedger::new();
        let wallet = Wallet::generate();
        let record = signed(&wallet, "content", &body);
        let id = ledger.submit_chunked(&record, &path, 64).await.unwrap();
        assert_eq!(ledger.body(&id).unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn owner_filter_can_be_ignored() {
        let ledger = InMemoryLedger::new();
        ledger.insert_record(Address::new("mallory").unwrap(), tags("ref"));
        let query = RecordQuery::new(SortOrder::HeightDesc)
            .tag("type", "ref")
            .owners([Address::new("alice").unwrap()]);
        assert!(ledger.query_page(&query, None).await.unwrap().records.is_empty());

        ledger.ignore_owner_filter();
        assert_eq!(ledger.query_page(&query, None).await.unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn cursor_continues_after_last_record() {
        let ledger = InMemoryLedger::new();
        for _ in 0..3 {
            ledger.insert_record(Address::new("a").unwrap(), tags("ref"));
        }
        let query = RecordQuery::new(SortOrder::HeightAsc).tag("type", "ref").page_size(2);
        let first = ledger.query_page(&query, None).await.unwrap();
        let second = ledger
            .query_page(&query, first.end_cursor.as_ref())
            .await
            .unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(second.records.len(), 1);
        assert!(second.records[0].height > first.records[1].height);
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_counted() {
        let ledger = InMemoryLedger::new();
        ledger.fail_next_queries(1);
        let query = RecordQuery::new(SortOrder::HeightAsc);
        assert!(ledger.query_page(&query, None).await.unwrap_err().is_transient());
        assert!(ledger.query_page(&query, None).await.is_ok());
    }

    #[tokio::test]
    async fn armed_failure_waits_for_its_turn() {
        let ledger = InMemoryLedger::new();
        ledger.fail_after(2);
        let query = RecordQuery::new(SortOrder::HeightAsc);
        assert!(ledger.query_page(&query, None).await.is_ok());
        assert!(ledger.query_page(&query, None).await.is_ok());
        assert!(ledger.query_page(&query, None).await.unwrap_err().is_transient());
        assert!(ledger.query_page(&query, None).await.is_ok());
    }
}
