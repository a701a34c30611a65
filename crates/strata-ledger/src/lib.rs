//! Ledger client boundary for Strata.
//!
//! Strata keeps no database: everything it knows is a ledger record. This
//! crate provides:
//! - `LedgerQuery` / `LedgerSubmit` trait boundaries
//! - [`RecordQuery`] tag/owner filters with height ordering
//! - [`RecordPager`], which drains cursor pagination until a short page
//! - [`InMemoryLedger`] for tests and local demos, with deferred finality
//! - [`HttpLedgerClient`] speaking GraphQL to a gateway for queries
//! - Retry with exponential backoff for transient query failures

pub mod chunk;
pub mod error;
pub mod http;
pub mod memory;
pub mod pager;
pub mod query;
pub mod retry;
pub mod traits;

pub use chunk::{Chunk, ChunkReader};
pub use error::{LedgerError, LedgerResult};
pub use http::{HttpLedgerClient, HttpLedgerConfig};
pub use memory::InMemoryLedger;
pub use pager::RecordPager;
pub use query::{Cursor, Page, RecordQuery, SortOrder, TagFilter};
pub use retry::{with_retry, RetryConfig};
pub use traits::{LedgerQuery, LedgerSubmit};
