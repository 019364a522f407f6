//! Object storage for report archives
//!
//! Archives live in one container per month. Two backends are supported behind the
//! [`ObjectStore`] trait: OpenStack Swift (the default) and S3-compatible stores.
//! [`ObjectStoreGateway`] adds the upload loop shared by both.

use crate::error::{ReportError, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub mod config;
pub mod s3;
pub mod swift;

pub use config::{Backend, ObjectStoreConfig, S3Config, SwiftConfig};

/// One object of a container listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    pub bytes: u64,
}

/// Minimal container operations the report flows need
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `container` unless it already exists
    async fn ensure_container(&self, container: &str) -> Result<()>;

    async fn put_object(&self, container: &str, name: &str, data: Vec<u8>) -> Result<()>;

    /// Objects in `container`, or `None` when the container does not exist
    async fn list(&self, container: &str) -> Result<Option<Vec<ObjectInfo>>>;

    async fn get(&self, container: &str, name: &str) -> Result<Vec<u8>>;
}

pub struct ObjectStoreGateway {
    store: Box<dyn ObjectStore>,
}

impl ObjectStoreGateway {
    pub fn new(store: Box<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Gateway for the backend selected in `config`
    ///
    /// No request is made until the first operation.
    pub fn connect(config: &ObjectStoreConfig, timeout: Duration) -> Result<Self> {
        let store: Box<dyn ObjectStore> = match config.backend {
            Backend::Swift => {
                let swift = config
                    .swift
                    .clone()
                    .ok_or_else(|| ReportError::config("object_store.swift section is missing"))?;
                Box::new(swift::SwiftStore::new(swift, config.insecure, timeout)?)
            },
            Backend::S3 => {
                let s3 = config
                    .s3
                    .as_ref()
                    .ok_or_else(|| ReportError::config("object_store.s3 section is missing"))?;
                if config.insecure {
                    warn!("object_store.insecure is ignored by the s3 backend");
                }
                Box::new(s3::S3Store::new(s3))
            },
        };

        Ok(Self::new(store))
    }

    /// Upload `paths` to `container`, each under its base name
    ///
    /// Yields the local paths that were stored. Failed files are logged and skipped. Nothing
    /// is sent for an empty input.
    pub fn upload<'a>(&'a self, paths: Vec<PathBuf>, container: &'a str) -> BoxStream<'a, PathBuf> {
        if paths.is_empty() {
            debug!("Nothing to upload to {}", container);
            return stream::empty().boxed();
        }

        let state = UploadState {
            store: self.store.as_ref(),
            container,
            pending: paths.into_iter(),
            prepared: false,
        };

        stream::unfold(state, |mut state| async move {
            if !state.prepared {
                state.prepared = true;
                if let Err(e) = state.store.ensure_container(state.container).await {
                    error!("Cannot prepare container {}: {}", state.container, e);
                    return None;
                }
            }

            while let Some(path) = state.pending.next() {
                match upload_file(state.store, state.container, &path).await {
                    Ok(()) => {
                        info!("Uploaded {} to {}", path.display(), state.container);
                        return Some((path, state));
                    },
                    Err(e) => error!("Failed to upload {}: {}", path.display(), e),
                }
            }

            None
        })
        .boxed()
    }

    /// Objects of `container`; a missing container is reported and yields `None`
    pub async fn list(&self, container: &str) -> Result<Option<Vec<ObjectInfo>>> {
        let objects = self.store.list(container).await?;
        if objects.is_none() {
            warn!("Container '{}' not found", container);
        }
        Ok(objects)
    }

    pub async fn get(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        self.store.get(container, name).await
    }
}

struct UploadState<'a> {
    store: &'a dyn ObjectStore,
    container: &'a str,
    pending: std::vec::IntoIter<PathBuf>,
    prepared: bool,
}

async fn upload_file(store: &dyn ObjectStore, container: &str, path: &Path) -> Result<()> {
    let name = object_name(path);
    let data = tokio::fs::read(path).await?;
    store.put_object(container, &name, data).await
}

/// Object name of a local file: its base name
pub fn object_name(path: &Path) -> String {
    crate::archive::base_name(path)
}
