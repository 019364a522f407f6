//! `ds-reports sign-upload` command implementation
//!
//! Turns every CSV report in the working directory into a signed archive and moves all
//! archives to the object store. Files stay local until their upload succeeds.

use super::{directory_lock, http_timeout, local_now};
use crate::config::Settings;
use crate::error::Result;
use crate::period::ReportWindow;
use crate::signer::FileSigner;
use crate::storage::ObjectStoreGateway;
use futures::StreamExt;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Sign, archive and upload under the directory lock
pub async fn run(settings: &Settings) -> Result<()> {
    let _lock = directory_lock(settings).acquire().await?;

    let month = ReportWindow::previous_day(local_now(settings))?.month();
    let container = settings.object_store.put_container(month);
    let signer = FileSigner::new(settings.sign_api.clone(), http_timeout())?;
    let gateway = ObjectStoreGateway::connect(&settings.object_store, http_timeout())?;

    sign_and_upload(&signer, &gateway, &settings.main.working_directory(), &container).await?;
    Ok(())
}

/// Sign pending CSV files, then upload every archive in `directory` to `container`
///
/// Returns the archives that were uploaded and removed locally. The caller holds the lock.
pub async fn sign_and_upload(
    signer: &FileSigner,
    gateway: &ObjectStoreGateway,
    directory: &Path,
    container: &str,
) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        info!("{} not found", directory.display());
        return Ok(Vec::new());
    }

    info!("Looking for csv files in {}", directory.display());
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }

    let mut archives = BTreeSet::new();
    for path in files {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => {
                if let Some(archive) = signer.sign_and_archive(&path).await? {
                    archives.insert(archive);
                }
            },
            Some("zip") => {
                archives.insert(path);
            },
            _ => {},
        }
    }

    let uploaded: Vec<PathBuf> = gateway
        .upload(archives.into_iter().collect(), container)
        .collect()
        .await;

    for path in &uploaded {
        if let Err(e) = std::fs::remove_file(path) {
            error!("Uploaded {} but could not remove it: {}", path.display(), e);
        }
    }

    info!("Uploaded {} archives to {}", uploaded.len(), container);
    Ok(uploaded)
}
