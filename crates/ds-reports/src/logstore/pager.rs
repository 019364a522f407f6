//! Paged extraction of audit events from the log store

use super::query::msearch_body;
use super::types::{LogHit, MultiSearchResponse, PageQuery};
use crate::clock::{Sleeper, TokioSleeper};
use crate::error::{ReportError, Result};
use futures::stream::{self, Stream};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Kibana version the log store proxy expects in every request
pub const KBN_VERSION: &str = "5.6.2";

/// Pull-based reader over the hits of one time range
///
/// Pages are requested one at a time, in ascending event time. Each page after the first
/// starts right after the sort values of the previous page's last hit.
pub struct LogPager {
    client: Client,
    url: String,
    query: PageQuery,
    retry_wait: Duration,
    sleeper: Arc<dyn Sleeper>,
    cursor: Option<Vec<Value>>,
    buffered: VecDeque<LogHit>,
    exhausted: bool,
    page: usize,
}

impl LogPager {
    pub fn new(client: Client, host: &str, query: PageQuery, retry_wait: Duration) -> Self {
        Self {
            client,
            url: format!("{}/_msearch", host.trim_end_matches('/')),
            query,
            retry_wait,
            sleeper: Arc::new(TokioSleeper),
            cursor: None,
            buffered: VecDeque::new(),
            exhausted: false,
            page: 0,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Number of non-empty pages received so far
    pub fn pages_fetched(&self) -> usize {
        self.page
    }

    /// Fetch the next page of hits
    ///
    /// An empty page means the range is exhausted; later calls return empty without a
    /// request. Failed requests, non-success statuses and unreadable bodies are retried
    /// after `retry_wait` until one succeeds. Only a query error inside the response is fatal.
    pub async fn next_page(&mut self) -> Result<Vec<LogHit>> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        let body = msearch_body(&self.query, self.cursor.as_deref());
        let hits = loop {
            let sent = self
                .client
                .post(&self.url)
                .header("kbn-version", KBN_VERSION)
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(body.clone())
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    error!("Log store request failed: {}", e);
                    self.sleeper.sleep(self.retry_wait).await;
                    continue;
                },
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                error!("Unexpected response {}: {}", status, text);
                self.sleeper.sleep(self.retry_wait).await;
                continue;
            }

            let parsed = match response.bytes().await {
                Ok(body) => serde_json::from_slice::<MultiSearchResponse>(&body)
                    .map_err(|e| format!("undecodable body: {}", e)),
                Err(e) => Err(format!("cannot read body: {}", e)),
            };
            match parsed {
                Ok(parsed) => break parsed.into_hits()?,
                Err(e) => {
                    error!("Unexpected response {}: {}", status, e);
                    self.sleeper.sleep(self.retry_wait).await;
                },
            }
        };

        match (hits.first(), hits.last()) {
            (Some(first), Some(last)) => {
                self.page += 1;
                self.cursor = Some(last.cursor.clone());
                info!(
                    "Got {} hits, page {}, from {} to {}",
                    hits.len(),
                    self.page,
                    first.timestamp,
                    last.timestamp
                );
            },
            _ => {
                debug!("No more hits after page {}", self.page);
                self.exhausted = true;
            },
        }

        Ok(hits)
    }

    /// Next hit, fetching a new page when the current one is used up
    pub async fn next_hit(&mut self) -> Result<Option<LogHit>> {
        if self.buffered.is_empty() {
            self.buffered = self.next_page().await?.into();
        }
        Ok(self.buffered.pop_front())
    }

    /// Consume the pager as a stream of hits
    pub fn into_stream(self) -> impl Stream<Item = Result<LogHit>> {
        stream::try_unfold(self, |mut pager| async move {
            let hit = pager.next_hit().await?;
            Ok::<_, ReportError>(hit.map(|hit| (hit, pager)))
        })
    }
}
