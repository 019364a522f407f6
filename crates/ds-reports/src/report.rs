//! Per-user CSV reports
//!
//! Every report owner gets one `{USER}-{YYYY-MM-DD}.csv` per reporting day. A file left
//! over from an earlier, interrupted run for the same day is replaced the first time the
//! owner shows up; after that rows are only appended.

use crate::error::Result;
use crate::logstore::LogHit;
use csv::{QuoteStyle, Writer, WriterBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Column order of every report file
pub const REPORT_HEADER: [&str; 4] = ["TIMESTAMP", "DOC_ID", "DOC_HASH", "REMOTE_ADDR"];

/// Groups hits into report files, keeping one open writer per owner
pub struct ReportAggregator {
    directory: PathBuf,
    suffix: String,
    writers: HashMap<String, Writer<File>>,
}

impl ReportAggregator {
    /// Aggregator writing `{USER}-{suffix}.csv` files into `directory`
    pub fn new(directory: impl Into<PathBuf>, suffix: impl Into<String>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;

        Ok(Self {
            directory,
            suffix: suffix.into(),
            writers: HashMap::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name of `user`'s report
    pub fn file_name(&self, user: &str) -> String {
        format!("{}-{}.csv", user, self.suffix)
    }

    /// Number of report files opened so far
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    /// Append one hit to its owner's report
    pub fn write(&mut self, hit: &LogHit) -> Result<()> {
        let file_name = self.file_name(&hit.user);

        if !self.writers.contains_key(&file_name) {
            let writer = self.open_report(&file_name)?;
            self.writers.insert(file_name.clone(), writer);
        }

        if let Some(writer) = self.writers.get_mut(&file_name) {
            writer.write_record([
                hit.timestamp.as_str(),
                hit.doc_id.as_str(),
                hit.doc_hash.as_str(),
                hit.remote_addr.as_str(),
            ])?;
        }

        Ok(())
    }

    fn open_report(&self, file_name: &str) -> Result<Writer<File>> {
        let path = self.directory.join(file_name);
        info!("New report file {}", path.display());

        if path.exists() {
            info!("Removing stale data from {}", path.display());
            std::fs::remove_file(&path)?;
        }

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Never)
            .from_writer(File::create(&path)?);
        writer.write_record(REPORT_HEADER)?;

        Ok(writer)
    }

    /// Flush and close every open report
    ///
    /// Failures are logged and do not stop the remaining files from closing.
    pub fn close(&mut self) {
        if self.writers.is_empty() {
            return;
        }

        info!("Closing {} report files", self.writers.len());
        for (file_name, mut writer) in self.writers.drain() {
            if let Err(e) = writer.flush() {
                error!("Failed to close report file {}: {}", file_name, e);
            }
        }
    }
}

impl Drop for ReportAggregator {
    fn drop(&mut self) {
        self.close();
    }
}
