use strata_types::LedgerRecord;

use crate::error::{LedgerError, LedgerResult};
use crate::query::{Cursor, RecordQuery};
use crate::retry::{with_retry, RetryConfig};
use crate::traits::LedgerQuery;

/// Lazy, restartable walk over every page of a query.
///
/// Pages are fetched on demand. The walk ends after the first page holding
/// fewer records than the query's page size; a full page is always followed
/// by another fetch, because the ledger gives no other signal that more
/// records exist.
pub struct RecordPager<'a> {
    ledger: &'a dyn LedgerQuery,
    query: RecordQuery,
    retry: RetryConfig,
    cursor: Option<Cursor>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a> RecordPager<'a> {
    pub fn new(ledger: &'a dyn LedgerQuery, query: RecordQuery) -> Self {
        Self {
            ledger,
            query,
            retry: RetryConfig::none(),
            cursor: None,
            exhausted: false,
            pages_fetched: 0,
        }
    }

    /// Retry each page fetch on transient failure.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn query(&self) -> &RecordQuery {
        &self.query
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Go back to the first page.
    pub fn restart(&mut self) {
        self.cursor = None;
        self.exhausted = false;
        self.pages_fetched = 0;
    }

    /// Fetch the next non-empty page, or `None` once the query is drained.
    pub async fn next_page(&mut self) -> LedgerResult<Option<Vec<LedgerRecord>>> {
        if self.exhausted {
            return Ok(None);
        }

        let ledger = self.ledger;
        let query = &self.query;
        let cursor = self.cursor.as_ref();
        let page = with_retry(&self.retry, "query_page", move || {
            ledger.query_page(query, cursor)
        })
        .await?;
        self.pages_fetched += 1;

        let count = page.records.len();
        tracing::debug!(
            page = self.pages_fetched,
            records = count,
            page_size = self.query.page_size,
            "fetched ledger page",
        );

        if count < self.query.page_size {
            self.exhausted = true;
        } else {
            match page.end_cursor {
                Some(next) => self.cursor = Some(next),
                None => {
                    return Err(LedgerError::Decode(
                        "full page returned without a continuation cursor".into(),
                    ))
                }
            }
        }

        if count == 0 {
            return Ok(None);
        }
        Ok(Some(page.records))
    }

    /// Drain every remaining page into one ordered list.
    pub async fn collect_all(&mut self) -> LedgerResult<Vec<LedgerRecord>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use strata_types::{Address, Tags};

    use super::*;
    use crate::memory::InMemoryLedger;
    use crate::query::SortOrder;

    fn seed(ledger: &InMemoryLedger, count: usize) {
        for i in 0..count {
            ledger.insert_record(
                Address::new("owner").unwrap(),
                Tags::new().with("type", "ref").with("n", i.to_string()),
            );
        }
    }

    #[tokio::test]
    async fn drains_exact_multiple_of_page_size() {
        let ledger = InMemoryLedger::new();
        seed(&ledger, 6);
        let query = RecordQuery::new(SortOrder::HeightAsc).tag("type", "ref").page_size(3);
        let mut pager = RecordPager::new(&ledger, query);
        let all = pager.collect_all().await.unwrap();
        assert_eq!(all.len(), 6);
        // two full pages, then an empty one to confirm the end
        assert_eq!(pager.pages_fetched(), 3);
        assert!(pager.is_exhausted());
    }

    #[tokio::test]
    async fn short_page_ends_the_walk() {
        let ledger = InMemoryLedger::new();
        seed(&ledger, 5);
        let query = RecordQuery::new(SortOrder::HeightAsc).tag("type", "ref").page_size(3);
        let mut pager = RecordPager::new(&ledger, query);
        let first = pager.next_page().await.unwrap().unwrap();
        let second = pager.next_page().await.unwrap().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        assert!(pager.next_page().await.unwrap().is_none());
        assert_eq!(pager.pages_fetched(), 2);
    }

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let ledger = InMemoryLedger::new();
        let query = RecordQuery::new(SortOrder::HeightDesc).tag("type", "org");
        let mut pager = RecordPager::new(&ledger, query);
        assert!(pager.next_page().await.unwrap().is_none());
        assert!(pager.collect_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn descending_order_and_restart() {
        let ledger = InMemoryLedger::new();
        seed(&ledger, 4);
        let query = RecordQuery::new(SortOrder::HeightDesc).tag("type", "ref").page_size(2);
        let mut pager = RecordPager::new(&ledger, query);
        let all = pager.collect_all().await.unwrap();
        let heights: Vec<u64> = all.iter().map(|r| r.height).collect();
        let mut sorted = heights.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(heights, sorted);

        pager.restart();
        assert_eq!(pager.collect_all().await.unwrap(), all);
    }

    #[tokio::test]
    async fn transient_failure_propagates_without_retry() {
        let ledger = InMemoryLedger::new();
        seed(&ledger, 1);
        ledger.fail_next_queries(1);
        let query = RecordQuery::new(SortOrder::HeightAsc).tag("type", "ref");
        let mut pager = RecordPager::new(&ledger, query);
        let err = pager.next_page().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn transient_failure_is_retried_when_configured() {
        let ledger = InMemoryLedger::new();
        seed(&ledger, 1);
        ledger.fail_next_queries(2);
        let query = RecordQuery::new(SortOrder::HeightAsc).tag("type", "ref");
        let mut pager = RecordPager::new(&ledger, query).with_retry(RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        });
        assert_eq!(pager.collect_all().await.unwrap().len(), 1);
    }
}
