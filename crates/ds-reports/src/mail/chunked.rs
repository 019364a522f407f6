//! Size-bounded distribution of a directory by email
//!
//! Files are packed greedily, in directory-listing order, into chunks that stay within the
//! byte budget. Each chunk becomes one zip archive next to the directory and one email.

use super::{MailSender, OutgoingMail};
use crate::archive::write_zip;
use crate::config::Recipients;
use crate::error::{ReportError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Subject prefix of every report email
pub const REPORT_EMAIL_SUBJECT: &str = "DS Uploads Report for";

pub const EMAIL_BODY: &str = "Please find the attached file";

/// Split `files` into consecutive groups whose total size stays within `max_bytes`
///
/// A new group starts when the next file would push a non-empty group over the budget, so
/// a file larger than the budget ends up alone in its group. Never yields an empty group.
pub fn pack_chunks<T>(files: impl IntoIterator<Item = (T, u64)>, max_bytes: u64) -> Vec<Vec<T>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut current_bytes = 0u64;

    for (file, size) in files {
        if !current.is_empty() && current_bytes.saturating_add(size) > max_bytes {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current.push(file);
        current_bytes = current_bytes.saturating_add(size);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Subject of chunk `part` (1-based) out of `total`
pub fn subject(period: &str, part: usize, total: usize) -> String {
    if total > 1 {
        format!("{} {} part {}", REPORT_EMAIL_SUBJECT, period, part)
    } else {
        format!("{} {}", REPORT_EMAIL_SUBJECT, period)
    }
}

/// Archive of chunk `part` (1-based) out of `total`, placed beside `directory`
pub fn archive_path(directory: &Path, period: &str, part: usize, total: usize) -> PathBuf {
    let mut name = directory.as_os_str().to_owned();
    if total > 1 {
        name.push(format!("-{}-part-{}.zip", period, part));
    } else {
        name.push(format!("-{}.zip", period));
    }
    PathBuf::from(name)
}

pub struct ChunkedMailer {
    sender: Arc<dyn MailSender>,
    from: String,
    max_bytes: u64,
}

impl ChunkedMailer {
    pub fn new(sender: Arc<dyn MailSender>, from: impl Into<String>, max_bytes: u64) -> Self {
        Self {
            sender,
            from: from.into(),
            max_bytes,
        }
    }

    /// Mail every file directly under `directory` to `recipients`
    ///
    /// `label` names the report owner in log messages. Returns the archives that were sent.
    pub async fn distribute(
        &self,
        recipients: &Recipients,
        label: &str,
        directory: &Path,
        period: &str,
    ) -> Result<Vec<PathBuf>> {
        let files = list_files(directory)?;
        if files.is_empty() {
            warn!("No files to send for {} in {}", label, directory.display());
            return Ok(Vec::new());
        }

        let chunks = pack_chunks(files, self.max_bytes);
        let total = chunks.len();
        let mut sent = Vec::with_capacity(total);

        for (index, chunk) in chunks.into_iter().enumerate() {
            let part = index + 1;
            let archive = archive_path(directory, period, part, total);
            write_zip(&archive, chunk.as_slice())?;

            let mail = OutgoingMail {
                from: self.from.clone(),
                to: recipients.addresses().into_iter().map(str::to_string).collect(),
                subject: subject(period, part, total),
                body: EMAIL_BODY.to_string(),
                attachment: archive.clone(),
            };
            self.sender.send(&mail).await?;

            if total > 1 {
                info!("Email is sent to {} (part {} of {})", label, part, total);
            } else {
                info!("Email is sent to {}", label);
            }
            sent.push(archive);
        }

        Ok(sent)
    }
}

/// Regular files directly under `directory` with their sizes, in listing order
fn list_files(directory: &Path) -> Result<Vec<(PathBuf, u64)>> {
    let entries = std::fs::read_dir(directory).map_err(|e| {
        ReportError::Io(std::io::Error::new(
            e.kind(),
            format!("cannot list {}: {}", directory.display(), e),
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            files.push((entry.path(), metadata.len()));
        }
    }
    Ok(files)
}
