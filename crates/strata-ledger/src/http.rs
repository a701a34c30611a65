//! Gateway client: GraphQL for queries, HTTP for submissions.
//!
//! Queries are sent as a parameterised GraphQL document, never by splicing
//! tag values into the query text. Submissions post a JSON envelope holding
//! the signed record to `<gateway>/tx`; bodies above the inline limit follow
//! as base64 chunks to `<gateway>/chunk`.
//!
//! Retries are not built into the client; [`RecordPager`](crate::RecordPager)
//! applies the retry policy per page.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strata_crypto::SignedRecord;
use strata_types::{Address, LedgerRecord, Tag, Tags, TxId};

use crate::chunk::ChunkReader;
use crate::error::{LedgerError, LedgerResult};
use crate::query::{Cursor, Page, RecordQuery, SortOrder, TagFilter};
use crate::traits::{LedgerQuery, LedgerSubmit};

const RECORDS_QUERY: &str = r#"
query Records($tags: [TagFilter!], $owners: [String!], $sort: SortOrder, $first: Int, $after: String) {
  transactions(tags: $tags, owners: $owners, sort: $sort, first: $first, after: $after) {
    edges {
      cursor
      node {
        id
        owner { address }
        tags { name value }
        data { size }
        block { height }
      }
    }
  }
}
"#;

/// Connection settings for [`HttpLedgerClient`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpLedgerConfig {
    pub graphql_endpoint: String,
    pub gateway_url: String,
    pub timeout_secs: u64,
}

impl HttpLedgerConfig {
    pub fn new(graphql_endpoint: impl Into<String>, gateway_url: impl Into<String>) -> Self {
        Self {
            graphql_endpoint: graphql_endpoint.into(),
            gateway_url: gateway_url.into(),
            timeout_secs: 30,
        }
    }
}

/// Ledger client talking to a gateway over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    client: reqwest::Client,
    graphql_endpoint: String,
    gateway_url: String,
}

impl HttpLedgerClient {
    pub fn new(config: HttpLedgerConfig) -> LedgerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LedgerError::Transport {
                endpoint: config.gateway_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            graphql_endpoint: config.graphql_endpoint,
            gateway_url: config.gateway_url,
        })
    }

    fn gateway_endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.gateway_url.trim_end_matches('/'))
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> LedgerResult<reqwest::Response> {
        let response = self
            .client
            .post(endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Gateway {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }
        Ok(response)
    }
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'static str,
    variables: Variables<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    tags: &'a [TagFilter],
    owners: Option<Vec<&'a str>>,
    sort: SortOrder,
    first: usize,
    after: Option<&'a str>,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<TransactionsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
struct TransactionsData {
    transactions: Connection,
}

#[derive(Deserialize)]
struct Connection {
    edges: Vec<Edge>,
}

#[derive(Deserialize)]
struct Edge {
    cursor: String,
    node: Node,
}

#[derive(Deserialize)]
struct Node {
    id: String,
    owner: OwnerNode,
    #[serde(default)]
    tags: Vec<Tag>,
    data: Option<DataNode>,
    block: Option<BlockNode>,
}

#[derive(Deserialize)]
struct OwnerNode {
    address: String,
}

#[derive(Deserialize)]
struct DataNode {
    size: serde_json::Value,
}

#[derive(Deserialize)]
struct BlockNode {
    height: u64,
}

impl Node {
    // Gateways do not expose intra-block order; callers consume records in
    // the order the gateway returns them, so `sequence` stays zero.
    fn into_record(self) -> LedgerResult<LedgerRecord> {
        let data_size = match self.data.map(|d| d.size) {
            Some(serde_json::Value::String(s)) => s
                .parse()
                .map_err(|_| LedgerError::Decode(format!("bad data size {s:?}")))?,
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
            _ => 0,
        };
        Ok(LedgerRecord {
            id: TxId::new(self.id).map_err(|e| LedgerError::Decode(e.to_string()))?,
            owner: Address::new(self.owner.address)
                .map_err(|e| LedgerError::Decode(e.to_string()))?,
            height: self
                .block
                .map_or(LedgerRecord::PENDING_HEIGHT, |b| b.height),
            sequence: 0,
            tags: Tags::from_list(self.tags),
            data_size,
        })
    }
}

#[async_trait]
impl LedgerQuery for HttpLedgerClient {
    async fn query_page(&self, query: &RecordQuery, after: Option<&Cursor>) -> LedgerResult<Page> {
        let request = GraphqlRequest {
            query: RECORDS_QUERY,
            variables: Variables {
                tags: &query.tags,
                owners: query
                    .owners
                    .as_ref()
                    .map(|owners| owners.iter().map(Address::as_str).collect()),
                sort: query.sort,
                first: query.page_size,
                after: after.map(Cursor::as_str),
            },
        };

        let response = self.post_json(&self.graphql_endpoint, &request).await?;
        let parsed: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(LedgerError::Query(messages.join("; ")));
        }
        let data = parsed
            .data
            .ok_or_else(|| LedgerError::Decode("response carried neither data nor errors".into()))?;

        let end_cursor = data
            .transactions
            .edges
            .last()
            .map(|edge| Cursor::new(edge.cursor.clone()));
        let records = data
            .transactions
            .edges
            .into_iter()
            .map(|edge| edge.node.into_record())
            .collect::<LedgerResult<Vec<_>>>()?;

        Ok(Page {
            records,
            end_cursor,
        })
    }
}

#[derive(Serialize)]
struct SubmitEnvelope<'a> {
    record: &'a SignedRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

#[derive(Serialize)]
struct ChunkEnvelope<'a> {
    id: &'a TxId,
    offset: u64,
    chunk: String,
}

#[async_trait]
impl LedgerSubmit for HttpLedgerClient {
    async fn submit_record(&self, record: &SignedRecord, body: Bytes) -> LedgerResult<TxId> {
        let envelope = SubmitEnvelope {
            record,
            data: Some(URL_SAFE_NO_PAD.encode(&body)),
        };
        self.post_json(&self.gateway_endpoint("tx"), &envelope).await?;
        tracing::info!(id = %record.id, size = record.data_size, "submitted record");
        Ok(record.id.clone())
    }

    async fn submit_chunked(
        &self,
        record: &SignedRecord,
        body: &Path,
        chunk_size: usize,
    ) -> LedgerResult<TxId> {
        let mut reader = ChunkReader::open(body, chunk_size).await?;
        let total_chunks = reader.total_chunks();

        let envelope = SubmitEnvelope { record, data: None };
        self.post_json(&self.gateway_endpoint("tx"), &envelope).await?;

        let chunk_endpoint = self.gateway_endpoint("chunk");
        while let Some(chunk) = reader.next_chunk().await? {
            let envelope = ChunkEnvelope {
                id: &record.id,
                offset: chunk.offset,
                chunk: URL_SAFE_NO_PAD.encode(&chunk.data),
            };
            self.post_json(&chunk_endpoint, &envelope).await?;
            tracing::debug!(
                id = %record.id,
                chunk = chunk.index + 1,
                total = total_chunks,
                "uploaded chunk",
            );
        }

        tracing::info!(
            id = %record.id,
            size = record.data_size,
            chunks = total_chunks,
            "submitted chunked record",
        );
        Ok(record.id.clone())
    }
}
