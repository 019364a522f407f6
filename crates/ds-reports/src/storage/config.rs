use crate::error::{ReportError, Result};
use crate::period::MonthKey;
use serde::{Deserialize, Serialize};

/// Region used when an S3 section does not name one
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Which object store implementation serves the report containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Swift,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Containers are named `{container_prefix}-{YYYY-MM}` unless set explicitly
    pub container_prefix: String,

    #[serde(default)]
    pub put_container: Option<String>,

    #[serde(default)]
    pub get_container: Option<String>,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub swift: Option<SwiftConfig>,

    #[serde(default)]
    pub s3: Option<S3Config>,
}

impl ObjectStoreConfig {
    /// Container that receives the archives of the month being reported
    pub fn put_container(&self, month: MonthKey) -> String {
        self.put_container
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.container_prefix, month))
    }

    /// Container the archives of the month being mailed are read from
    pub fn get_container(&self, month: MonthKey) -> String {
        self.get_container
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.container_prefix, month))
    }

    pub fn validate(&self) -> Result<()> {
        match self.backend {
            Backend::Swift if self.swift.is_none() => Err(ReportError::config(
                "object_store.backend is 'swift' but the object_store.swift section is missing",
            )),
            Backend::S3 if self.s3.is_none() => Err(ReportError::config(
                "object_store.backend is 's3' but the object_store.s3 section is missing",
            )),
            _ => Ok(()),
        }
    }
}

/// OpenStack Swift with Keystone authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwiftConfig {
    #[serde(alias = "os_auth_url")]
    pub auth_url: String,

    /// "3" for Keystone v3, "1" for TempAuth-style v1
    #[serde(default = "default_auth_version")]
    pub auth_version: String,

    #[serde(alias = "os_username")]
    pub username: String,

    #[serde(alias = "os_password")]
    pub password: String,

    #[serde(default = "default_domain", alias = "os_user_domain_name")]
    pub user_domain_name: String,

    #[serde(default = "default_domain", alias = "os_project_domain_name")]
    pub project_domain_name: String,

    #[serde(default, alias = "os_project_name")]
    pub project_name: Option<String>,

    #[serde(default, alias = "os_region_name")]
    pub region_name: Option<String>,
}

fn default_auth_version() -> String {
    "3".to_string()
}

fn default_domain() -> String {
    "Default".to_string()
}

/// S3-compatible storage (AWS, MinIO, Ceph RGW)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    pub access_key: String,
    pub secret_key: String,

    #[serde(default)]
    pub path_style: bool,
}

fn default_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

impl S3Config {
    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: DEFAULT_S3_REGION.to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
        }
    }
}
