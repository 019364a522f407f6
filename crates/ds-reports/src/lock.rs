//! Working directory lock
//!
//! Runs of the three commands share one working directory. A run holds the directory by
//! creating a zero-byte sentinel file in it; the file disappears when the [`LockGuard`]
//! is dropped, whichever way the protected code exits.
//!
//! The lock is not reentrant: acquiring it twice from the same process without dropping
//! the first guard waits for (and times out on) itself.

use crate::clock::{Sleeper, TokioSleeper};
use crate::error::{ReportError, Result};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Name of the sentinel file inside the locked directory
pub const LOCK_FILE_NAME: &str = "ds-reports.lock";

/// Default pause between checks while the directory is held elsewhere
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Lock settings for one directory
pub struct DirectoryLock {
    directory: PathBuf,
    timeout: Duration,
    retry_interval: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl DirectoryLock {
    /// Lock for `directory` that fails immediately when already held
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            timeout: Duration::ZERO,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// How long to keep waiting for a held lock; zero means never wait
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn sentinel_path(&self) -> PathBuf {
        self.directory.join(LOCK_FILE_NAME)
    }

    /// Take the lock, waiting up to the configured timeout
    pub async fn acquire(&self) -> Result<LockGuard> {
        std::fs::create_dir_all(&self.directory)?;
        let sentinel = self.sentinel_path();
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&sentinel) {
                Ok(_) => {
                    debug!(path = %sentinel.display(), "Directory lock acquired");
                    return Ok(LockGuard { path: sentinel });
                },
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.timeout.is_zero() || started.elapsed() > self.timeout {
                        return Err(ReportError::Locked(self.directory.clone()));
                    }
                    debug!(
                        path = %sentinel.display(),
                        retry_in = ?self.retry_interval,
                        "Directory is locked, waiting"
                    );
                    self.sleeper.sleep(self.retry_interval).await;
                },
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Held lock; dropping it removes the sentinel file
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Path of the sentinel file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) {}
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Directory lock released"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove lock file"),
        }
    }
}
