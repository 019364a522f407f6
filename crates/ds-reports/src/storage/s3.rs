//! S3-compatible backend (AWS S3, MinIO, Ceph RGW)
//!
//! Containers map to buckets and object names to keys.

use super::config::S3Config;
use super::{ObjectInfo, ObjectStore};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info, instrument};

pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(config: &S3Config) -> Self {
        debug!(
            "Initializing S3 client (endpoint: {:?}, region: {})",
            config.endpoint, config.region
        );

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "ds-reports",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
        }
    }
}

fn s3_error(context: &str, err: impl std::error::Error) -> ReportError {
    ReportError::object_store(format!("{}: {}", context, DisplayErrorContext(err)))
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self))]
    async fn ensure_container(&self, container: &str) -> Result<()> {
        if self.client.head_bucket().bucket(container).send().await.is_ok() {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(container)
            .send()
            .await
            .map_err(|e| s3_error(&format!("Failed to create bucket {}", container), e))?;

        info!("Created bucket {}", container);
        Ok(())
    }

    #[instrument(skip(self, data))]
    async fn put_object(&self, container: &str, name: &str, data: Vec<u8>) -> Result<()> {
        debug!("Uploading {} bytes to s3://{}/{}", data.len(), container, name);

        self.client
            .put_object()
            .bucket(container)
            .key(name)
            .content_type("application/zip")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| s3_error("Failed to upload to S3", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, container: &str) -> Result<Option<Vec<ObjectInfo>>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = match self
                .client
                .list_objects_v2()
                .bucket(container)
                .set_continuation_token(continuation.take())
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    if e.as_service_error().is_some_and(|se| se.is_no_such_bucket()) {
                        return Ok(None);
                    }
                    return Err(s3_error("Failed to list S3 objects", e));
                },
            };

            objects.extend(response.contents().iter().filter_map(|obj| {
                obj.key().map(|key| ObjectInfo {
                    name: key.to_string(),
                    bytes: obj.size().unwrap_or(0).max(0) as u64,
                })
            }));

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                },
                _ => break,
            }
        }

        Ok(Some(objects))
    }

    #[instrument(skip(self))]
    async fn get(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(container)
            .key(name)
            .send()
            .await
            .map_err(|e| s3_error(&format!("Failed to download {}", name), e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| s3_error("Failed to read S3 response body", e))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), container, name);
        Ok(data)
    }
}
