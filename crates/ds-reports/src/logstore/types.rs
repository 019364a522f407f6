//! Log store request/response types

use crate::error::{ReportError, Result};
use serde::Deserialize;
use serde_json::Value;

/// One document-upload audit event
#[derive(Debug, Clone, PartialEq)]
pub struct LogHit {
    pub user: String,
    pub remote_addr: String,
    pub doc_id: String,
    pub doc_hash: String,
    /// Human-readable event time, copied into reports as is
    pub timestamp: String,
    /// Event time in epoch millis, as sorted on by the log store
    pub event_time: Option<i64>,
    /// Sort values of this hit; the next page starts right after them
    pub cursor: Vec<Value>,
}

/// Time range and page size of one extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub index: String,
    pub start_millis: i64,
    pub end_millis: i64,
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MultiSearchResponse {
    responses: Vec<SearchResponse>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    hits: Option<HitsEnvelope>,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_source")]
    source: HitSource,
    #[serde(default)]
    sort: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct HitSource {
    #[serde(rename = "USER")]
    user: String,
    #[serde(rename = "REMOTE_ADDR")]
    remote_addr: String,
    #[serde(rename = "DOC_ID")]
    doc_id: String,
    #[serde(rename = "DOC_HASH")]
    doc_hash: String,
    #[serde(rename = "TIMESTAMP")]
    timestamp: String,
}

impl MultiSearchResponse {
    /// Hits of the single query in the request
    ///
    /// A query error reported inside a successful response is fatal.
    pub(crate) fn into_hits(self) -> Result<Vec<LogHit>> {
        let response = self
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ReportError::LogStoreQuery("empty msearch response".to_string()))?;

        if let Some(error) = response.error {
            return Err(ReportError::LogStoreQuery(error.to_string()));
        }

        let hits = response.hits.map(|h| h.hits).unwrap_or_default();
        Ok(hits.into_iter().map(LogHit::from).collect())
    }
}

impl From<RawHit> for LogHit {
    fn from(raw: RawHit) -> Self {
        let event_time = raw.sort.first().and_then(Value::as_i64);
        LogHit {
            user: raw.source.user,
            remote_addr: raw.source.remote_addr,
            doc_id: raw.source.doc_id,
            doc_hash: raw.source.doc_hash,
            timestamp: raw.source.timestamp,
            event_time,
            cursor: raw.sort,
        }
    }
}
