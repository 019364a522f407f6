//! Signing and archiving of report files
//!
//! A report `x.csv` ends up as `x.zip` holding the CSV and, when a signing endpoint is
//! configured, its detached signature `x.csv.p7s`. Work that already happened is never
//! repeated: an existing signature is reused and an existing archive is taken as final.

use crate::archive::{base_name, write_zip};
use crate::config::SignApiConfig;
use crate::error::Result;
use ds_reports_common::checksum::file_sha256_hex;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Extension appended to a report's file name for its signature
pub const SIGNATURE_EXTENSION: &str = "p7s";

/// Archive that replaces `csv`
pub fn archive_path(csv: &Path) -> PathBuf {
    csv.with_extension("zip")
}

/// Detached signature of `csv`
pub fn signature_path(csv: &Path) -> PathBuf {
    let mut name = csv.as_os_str().to_owned();
    name.push(".");
    name.push(SIGNATURE_EXTENSION);
    PathBuf::from(name)
}

pub struct FileSigner {
    client: Client,
    api: Option<SignApiConfig>,
}

impl FileSigner {
    /// Signer posting to `api`; `None` produces unsigned archives
    pub fn new(api: Option<SignApiConfig>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api })
    }

    pub fn is_signing(&self) -> bool {
        self.api.is_some()
    }

    /// Sign `csv` and pack it into its archive
    ///
    /// Returns `None` when signing failed; the CSV is left in place for a later pass.
    pub async fn sign_and_archive(&self, csv: &Path) -> Result<Option<PathBuf>> {
        let archive = archive_path(csv);
        let signature = signature_path(csv);

        if archive.exists() {
            debug!("Archive {} already exists", archive.display());
        } else {
            if !signature.exists() {
                if let Some(api) = &self.api {
                    match self.request_signature(api, csv).await {
                        Some(bytes) => std::fs::write(&signature, bytes)?,
                        None => return Ok(None),
                    }
                }
            }

            if signature.exists() {
                write_zip(&archive, &[csv, signature.as_path()])?;
            } else {
                write_zip(&archive, &[csv])?;
            }
            match file_sha256_hex(&archive) {
                Ok(digest) => info!("Archived {} (sha256 {})", archive.display(), digest),
                Err(e) => warn!("Archived {} but could not hash it: {}", archive.display(), e),
            }
        }

        remove_if_exists(csv)?;
        remove_if_exists(&signature)?;

        Ok(Some(archive))
    }

    async fn request_signature(&self, api: &SignApiConfig, csv: &Path) -> Option<Vec<u8>> {
        let content = match tokio::fs::read(csv).await {
            Ok(content) => content,
            Err(e) => {
                error!("Cannot read {}: {}", csv.display(), e);
                return None;
            },
        };

        let part = Part::bytes(content).file_name(base_name(csv));
        let response = self
            .client
            .post(&api.sign_file_url)
            .basic_auth(&api.username, Some(&api.password))
            .multipart(Form::new().part("file", part))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!("Signing request for {} failed: {}", csv.display(), e);
                return None;
            },
        };

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            error!("Signing has failed: {} {}", status, text);
            return None;
        }

        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                error!("Cannot read signature of {}: {}", csv.display(), e);
                None
            },
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
