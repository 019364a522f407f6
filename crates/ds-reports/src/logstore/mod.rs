//! Audit-event extraction from an Elasticsearch-compatible log store

pub mod pager;
pub mod query;
pub mod types;

pub use pager::{LogPager, KBN_VERSION};
pub use types::{LogHit, PageQuery};

use crate::config::EsConfig;
use crate::error::Result;
use crate::period::ReportWindow;
use reqwest::Client;

/// Pager over every upload event inside `window`
pub fn fetch(es: &EsConfig, window: &ReportWindow) -> Result<LogPager> {
    let client = Client::builder().timeout(es.timeout()).build()?;
    let query = PageQuery {
        index: es.index.clone(),
        start_millis: window.start_millis(),
        end_millis: window.end_millis(),
        page_size: es.page_size,
    };

    Ok(LogPager::new(client, &es.host, query, es.retry_wait()))
}
