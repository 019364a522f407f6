//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function. Every command holds the
//! working directory lock for its whole run.

pub mod prepare;
pub mod send;
pub mod upload;

use crate::config::{Settings, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::lock::DirectoryLock;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Lock on the configured working directory
pub fn directory_lock(settings: &Settings) -> DirectoryLock {
    DirectoryLock::new(settings.main.working_directory())
        .timeout(settings.main.lock_timeout())
        .retry_interval(settings.main.lock_retry_interval())
}

/// Current time in the configured timezone
pub fn local_now(settings: &Settings) -> DateTime<Tz> {
    Utc::now().with_timezone(&settings.main.timezone)
}

/// Timeout for signing and object store requests
pub fn http_timeout() -> Duration {
    Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
}
