//! Configuration management for DS Reports
//!
//! Settings come from a YAML file passed with `--config`. A `.env` file is read first and a
//! few environment variables override file values, so credentials can stay out of the file:
//!
//! | Variable                     | Overrides                        |
//! |------------------------------|----------------------------------|
//! | `DS_REPORTS_DIRECTORY`       | `main.directory`                 |
//! | `DS_REPORTS_ES_HOST`         | `es.host`                        |
//! | `DS_REPORTS_SWIFT_PASSWORD`  | `object_store.swift.password`    |
//! | `DS_REPORTS_S3_SECRET_KEY`   | `object_store.s3.secret_key`     |
//! | `DS_REPORTS_SIGN_PASSWORD`   | `sign_api.password`              |
//! | `DS_REPORTS_SMTP_PASSWORD`   | `email.password`                 |

use crate::error::{ReportError, Result};
use crate::storage::config::ObjectStoreConfig;
use chrono_tz::Tz;
use ds_reports_common::LogConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Timezone the report day is computed in.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Kiev;

/// Working directory name under the system temp dir when `main.directory` is unset.
pub const DEFAULT_TEMP_DIR_NAME: &str = "ds_reports";

/// Hits requested per log-store page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Seconds to wait before repeating a failed log-store page request.
pub const DEFAULT_RETRY_WAIT_SECS: f64 = 10.0;

/// HTTP timeout for log store, signing and object store requests.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Largest attachment (in bytes) packed into one email unless a single file is bigger.
pub const DEFAULT_MAX_BYTES_LIMIT: u64 = 20 * 1024 * 1024;

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub main: MainConfig,

    /// Log store; required by `prepare`
    #[serde(default)]
    pub es: Option<EsConfig>,

    pub object_store: ObjectStoreConfig,

    /// Signing endpoint; without it archives hold the CSV only
    #[serde(default)]
    pub sign_api: Option<SignApiConfig>,

    /// SMTP settings; required by `send`
    #[serde(default)]
    pub email: Option<EmailConfig>,

    /// Report owner name -> email address(es)
    #[serde(default)]
    pub brokers_emails: BTreeMap<String, Recipients>,

    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    pub timezone: Tz,
    pub directory: Option<PathBuf>,
    pub temp_dir_name: String,
    pub lock_timeout_secs: f64,
    pub lock_retry_interval_secs: f64,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            directory: None,
            temp_dir_name: DEFAULT_TEMP_DIR_NAME.to_string(),
            lock_timeout_secs: 0.0,
            lock_retry_interval_secs: 1.0,
        }
    }
}

impl MainConfig {
    /// Directory holding CSV files, archives and the lock sentinel
    pub fn working_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(&self.temp_dir_name))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.lock_timeout_secs)
    }

    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_secs_f64(self.lock_retry_interval_secs)
    }
}

/// Elasticsearch log store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsConfig {
    pub host: String,
    pub index: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_retry_wait_secs")]
    pub retry_wait_secs: f64,

    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl EsConfig {
    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs_f64(self.retry_wait_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_retry_wait_secs() -> f64 {
    DEFAULT_RETRY_WAIT_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

/// Remote signing endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct SignApiConfig {
    pub sign_file_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SignApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignApiConfig")
            .field("sign_file_url", &self.sign_file_url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// SMTP delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,

    /// Sender address, also used as the envelope sender
    pub verified_email: String,

    #[serde(default = "default_true")]
    pub use_tls: bool,

    #[serde(default)]
    pub use_auth: bool,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_max_bytes_limit")]
    pub max_bytes_limit: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_bytes_limit() -> u64 {
    DEFAULT_MAX_BYTES_LIMIT
}

/// One address or a list of addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            Recipients::One(address) => vec![address.as_str()],
            Recipients::Many(addresses) => addresses.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for Recipients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addresses().join(", "))
    }
}

impl Settings {
    /// Load settings from a YAML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReportError::config(format!("cannot read config file '{}': {}", path.display(), e))
        })?;

        let mut settings = Self::from_yaml(&content)?;
        settings.apply_env_overrides();
        settings.validate()?;

        Ok(settings)
    }

    /// Parse settings from YAML text without touching the environment
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("DS_REPORTS_DIRECTORY") {
            self.main.directory = Some(PathBuf::from(dir));
        }

        if let (Ok(host), Some(es)) = (std::env::var("DS_REPORTS_ES_HOST"), self.es.as_mut()) {
            es.host = host;
        }

        if let (Ok(password), Some(swift)) = (
            std::env::var("DS_REPORTS_SWIFT_PASSWORD"),
            self.object_store.swift.as_mut(),
        ) {
            swift.password = password;
        }

        if let (Ok(secret), Some(s3)) = (
            std::env::var("DS_REPORTS_S3_SECRET_KEY"),
            self.object_store.s3.as_mut(),
        ) {
            s3.secret_key = secret;
        }

        if let (Ok(password), Some(sign_api)) =
            (std::env::var("DS_REPORTS_SIGN_PASSWORD"), self.sign_api.as_mut())
        {
            sign_api.password = password;
        }

        if let (Ok(password), Some(email)) =
            (std::env::var("DS_REPORTS_SMTP_PASSWORD"), self.email.as_mut())
        {
            email.password = Some(password);
        }
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if !self.main.lock_timeout_secs.is_finite() || self.main.lock_timeout_secs < 0.0 {
            return Err(ReportError::config(
                "main.lock_timeout_secs must be a finite number >= 0",
            ));
        }
        if !self.main.lock_retry_interval_secs.is_finite()
            || self.main.lock_retry_interval_secs <= 0.0
        {
            return Err(ReportError::config(
                "main.lock_retry_interval_secs must be a finite number > 0",
            ));
        }

        if let Some(es) = &self.es {
            if es.page_size == 0 {
                return Err(ReportError::config("es.page_size must be greater than 0"));
            }
            if !es.retry_wait_secs.is_finite() || es.retry_wait_secs < 0.0 {
                return Err(ReportError::config(
                    "es.retry_wait_secs must be a finite number >= 0",
                ));
            }
        }

        self.object_store.validate()?;

        if let Some(email) = &self.email {
            if email.smtp_port == 0 {
                return Err(ReportError::config("email.smtp_port must be greater than 0"));
            }
            if email.max_bytes_limit == 0 {
                return Err(ReportError::config("email.max_bytes_limit must be greater than 0"));
            }
            if email.use_auth && (email.username.is_none() || email.password.is_none()) {
                return Err(ReportError::config(
                    "email.use_auth requires email.username and email.password",
                ));
            }
        }

        if self.brokers_emails.is_empty() {
            tracing::warn!("No brokers_emails configured - send will skip every report owner");
        }

        Ok(())
    }

    pub fn es(&self) -> Result<&EsConfig> {
        self.es
            .as_ref()
            .ok_or_else(|| ReportError::config("the es section is required for this command"))
    }

    pub fn email(&self) -> Result<&EmailConfig> {
        self.email
            .as_ref()
            .ok_or_else(|| ReportError::config("the email section is required for this command"))
    }
}
