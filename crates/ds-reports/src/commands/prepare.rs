//! `ds-reports prepare` command implementation
//!
//! Extracts yesterday's upload events into per-user reports, then runs the sign-and-upload
//! pass over the working directory.

use super::upload::sign_and_upload;
use super::{directory_lock, http_timeout, local_now};
use crate::config::Settings;
use crate::error::Result;
use crate::logstore::{self, LogPager};
use crate::period::ReportWindow;
use crate::report::ReportAggregator;
use crate::signer::FileSigner;
use crate::storage::ObjectStoreGateway;
use futures::TryStreamExt;
use std::path::Path;
use tracing::info;

pub async fn run(settings: &Settings) -> Result<()> {
    let window = ReportWindow::previous_day(local_now(settings))?;
    let es = settings.es()?;
    let directory = settings.main.working_directory();

    let _lock = directory_lock(settings).acquire().await?;
    info!("Report time range: {} - {}", window.start, window.end);

    let pager = logstore::fetch(es, &window)?;
    collect_reports(pager, &directory, &window.day().to_string()).await?;

    let container = settings.object_store.put_container(window.month());
    let signer = FileSigner::new(settings.sign_api.clone(), http_timeout())?;
    let gateway = ObjectStoreGateway::connect(&settings.object_store, http_timeout())?;
    sign_and_upload(&signer, &gateway, &directory, &container).await?;

    Ok(())
}

/// Drain `pager` into `{USER}-{suffix}.csv` files under `directory`
///
/// Returns the number of hits written.
pub async fn collect_reports(pager: LogPager, directory: &Path, suffix: &str) -> Result<usize> {
    let mut aggregator = ReportAggregator::new(directory, suffix)?;
    let mut hits = std::pin::pin!(pager.into_stream());
    let mut count = 0usize;

    while let Some(hit) = hits.try_next().await? {
        aggregator.write(&hit)?;
        count += 1;
    }

    info!("Collected {} hits into {} report files", count, aggregator.len());
    aggregator.close();
    Ok(count)
}
