//! `ds-reports send` command implementation
//!
//! Downloads a month's archives from the object store, regroups them by report owner and
//! mails each owner's archives to the addresses in `brokers_emails`.

use super::{directory_lock, http_timeout, local_now};
use crate::config::{Recipients, Settings};
use crate::error::{ReportError, Result};
use crate::mail::{ChunkedMailer, SmtpMailer};
use crate::period::SendWindow;
use crate::storage::ObjectStoreGateway;
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Object names of daily archives: `{owner}-{YYYY-MM-DD}.zip`
pub const ARCHIVE_NAME_PATTERN: &str = r"^(?P<broker>.*)-(?P<date>\d{4}-\d{2}-\d{2})\.zip$";

/// Prefix of the scratch directory archives are downloaded into
pub const SEND_DATA_PREFIX: &str = "send_data_";

/// Outcome of one distribution run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SendSummary {
    /// Archives downloaded from the object store
    pub downloaded: usize,
    /// Owners whose archives were mailed
    pub mailed: Vec<String>,
    /// Owners without a configured address
    pub skipped: Vec<String>,
}

pub async fn run(
    settings: &Settings,
    send_from: Option<NaiveDate>,
    send_to: Option<NaiveDate>,
) -> Result<()> {
    let window = SendWindow::resolve(local_now(settings).date_naive(), send_from, send_to)?;
    let email = settings.email()?;

    let _lock = directory_lock(settings).acquire().await?;

    let gateway = ObjectStoreGateway::connect(&settings.object_store, http_timeout())?;
    let mailer = ChunkedMailer::new(
        Arc::new(SmtpMailer::new(email)?),
        email.verified_email.clone(),
        email.max_bytes_limit,
    );
    let container = settings.object_store.get_container(window.month());

    let summary = send_reports(
        &gateway,
        &mailer,
        &settings.brokers_emails,
        &settings.main.working_directory(),
        &container,
        &window,
    )
    .await?;

    info!(
        "Sent reports for {} owners, skipped {}",
        summary.mailed.len(),
        summary.skipped.len()
    );
    Ok(())
}

/// Owner and report day of an archive object name
pub fn parse_archive_name(pattern: &Regex, name: &str) -> Option<(String, NaiveDate)> {
    let captures = pattern.captures(name)?;
    let date = NaiveDate::parse_from_str(&captures["date"], "%Y-%m-%d").ok()?;
    Some((captures["broker"].to_string(), date))
}

/// Mail the archives of `container` that fall inside `window`
///
/// Archives are downloaded into a scratch `send_data_*` directory under `directory`, one
/// subdirectory per owner, which is removed afterwards.
pub async fn send_reports(
    gateway: &ObjectStoreGateway,
    mailer: &ChunkedMailer,
    brokers_emails: &BTreeMap<String, Recipients>,
    directory: &Path,
    container: &str,
    window: &SendWindow,
) -> Result<SendSummary> {
    info!("Send reports: {} - {}", window.from, window.to);
    let mut summary = SendSummary::default();

    let objects = match gateway.list(container).await? {
        Some(objects) if !objects.is_empty() => objects,
        _ => return Ok(summary),
    };

    let pattern = Regex::new(ARCHIVE_NAME_PATTERN).map_err(|e| ReportError::Other(e.into()))?;
    std::fs::create_dir_all(directory)?;
    let scratch = tempfile::Builder::new()
        .prefix(SEND_DATA_PREFIX)
        .tempdir_in(directory)?;

    for object in &objects {
        let Some((broker, date)) = parse_archive_name(&pattern, &object.name) else {
            debug!("Skipping {}", object.name);
            continue;
        };
        if !window.contains(date) {
            continue;
        }

        let data = gateway.get(container, &object.name).await?;
        let broker_dir = scratch.path().join(&broker);
        std::fs::create_dir_all(&broker_dir)?;
        std::fs::write(broker_dir.join(&object.name), data)?;
        summary.downloaded += 1;
    }

    let mut owners = Vec::new();
    for entry in std::fs::read_dir(scratch.path())? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            owners.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }

    let period = window.month().to_string();
    for (owner, owner_dir) in owners {
        match brokers_emails.get(&owner) {
            Some(recipients) => {
                mailer.distribute(recipients, &owner, &owner_dir, &period).await?;
                summary.mailed.push(owner);
            },
            None => {
                warn!("Email address not found for {}", owner);
                summary.skipped.push(owner);
            },
        }
    }

    scratch.close()?;
    Ok(summary)
}
