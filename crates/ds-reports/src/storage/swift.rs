//! OpenStack Swift backend
//!
//! Authenticates against Keystone (v3 password auth, or v1 for TempAuth-style proxies) on
//! first use and keeps the token and storage URL for the rest of the run.

use super::config::SwiftConfig;
use super::{ObjectInfo, ObjectStore};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

#[derive(Debug, Clone)]
struct Session {
    token: String,
    storage_url: String,
}

pub struct SwiftStore {
    client: Client,
    config: SwiftConfig,
    session: OnceCell<Session>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Token,
}

#[derive(Debug, Deserialize)]
struct Token {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    url: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    bytes: u64,
}

impl SwiftStore {
    /// `insecure` turns off TLS certificate verification for Keystone and Swift
    pub fn new(config: SwiftConfig, insecure: bool, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Ok(Self {
            client,
            config,
            session: OnceCell::new(),
        })
    }

    async fn session(&self) -> Result<&Session> {
        self.session.get_or_try_init(|| self.authenticate()).await
    }

    async fn authenticate(&self) -> Result<Session> {
        let session = match self.config.auth_version.as_str() {
            "1" | "1.0" => self.authenticate_v1().await?,
            "3" => self.authenticate_v3().await?,
            other => {
                return Err(ReportError::config(format!(
                    "unsupported Swift auth_version '{}'",
                    other
                )))
            },
        };
        info!("Authenticated to Swift at {}", session.storage_url);
        Ok(session)
    }

    async fn authenticate_v1(&self) -> Result<Session> {
        let response = self
            .client
            .get(&self.config.auth_url)
            .header("X-Auth-User", &self.config.username)
            .header("X-Auth-Key", &self.config.password)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::object_store(format!("Swift v1 auth failed: {}", status)));
        }

        let token = header_value(&response, AUTH_TOKEN_HEADER)?;
        let storage_url = header_value(&response, "X-Storage-Url")?;
        Ok(Session { token, storage_url })
    }

    async fn authenticate_v3(&self) -> Result<Session> {
        let url = format!("{}/auth/tokens", self.config.auth_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&self.v3_auth_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ReportError::object_store(format!(
                "Keystone auth failed: {} {}",
                status, text
            )));
        }

        let token = header_value(&response, SUBJECT_TOKEN_HEADER)?;
        let body: TokenResponse = response.json().await?;
        let storage_url = self.storage_endpoint(&body.token.catalog)?;
        Ok(Session { token, storage_url })
    }

    fn v3_auth_body(&self) -> Value {
        let mut body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.config.username,
                            "domain": { "name": self.config.user_domain_name },
                            "password": self.config.password,
                        }
                    }
                }
            }
        });

        if let Some(project) = &self.config.project_name {
            body["auth"]["scope"] = json!({
                "project": {
                    "name": project,
                    "domain": { "name": self.config.project_domain_name },
                }
            });
        }

        body
    }

    /// Public object-store endpoint, restricted to the configured region if any
    fn storage_endpoint(&self, catalog: &[CatalogEntry]) -> Result<String> {
        let region = self.config.region_name.as_deref();
        catalog
            .iter()
            .filter(|entry| entry.service_type == "object-store")
            .flat_map(|entry| entry.endpoints.iter())
            .filter(|endpoint| endpoint.interface == "public")
            .find(|endpoint| match region {
                Some(region) => {
                    endpoint.region.as_deref() == Some(region)
                        || endpoint.region_id.as_deref() == Some(region)
                },
                None => true,
            })
            .map(|endpoint| endpoint.url.clone())
            .ok_or_else(|| {
                ReportError::object_store("no public object-store endpoint in the service catalog")
            })
    }

    fn url(&self, session: &Session, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&session.storage_url)
            .map_err(|e| ReportError::object_store(format!("bad storage URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ReportError::object_store("storage URL cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for SwiftStore {
    async fn ensure_container(&self, container: &str) -> Result<()> {
        let session = self.session().await?;
        let response = self
            .client
            .put(self.url(session, &[container])?)
            .header(AUTH_TOKEN_HEADER, &session.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::object_store(format!(
                "cannot create container {}: {}",
                container, status
            )));
        }
        debug!("Container {} ready", container);
        Ok(())
    }

    async fn put_object(&self, container: &str, name: &str, data: Vec<u8>) -> Result<()> {
        let session = self.session().await?;
        let response = self
            .client
            .put(self.url(session, &[container, name])?)
            .header(AUTH_TOKEN_HEADER, &session.token)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ReportError::object_store(format!(
                "PUT {}/{} returned {} {}",
                container, name, status, text
            )));
        }
        Ok(())
    }

    async fn list(&self, container: &str) -> Result<Option<Vec<ObjectInfo>>> {
        let session = self.session().await?;
        let mut objects = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = self.url(session, &[container])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("format", "json");
                if let Some(marker) = &marker {
                    query.append_pair("marker", marker);
                }
            }

            let response = self
                .client
                .get(url)
                .header(AUTH_TOKEN_HEADER, &session.token)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(ReportError::object_store(format!(
                    "listing {} returned {}",
                    container, status
                )));
            }

            let body = response.bytes().await?;
            let page: Vec<ListedObject> = if body.is_empty() {
                Vec::new()
            } else {
                serde_json::from_slice(&body)?
            };

            match page.last() {
                Some(last) => marker = Some(last.name.clone()),
                None => break,
            }
            objects.extend(page.into_iter().map(|o| ObjectInfo {
                name: o.name,
                bytes: o.bytes,
            }));
        }

        debug!("Container {} holds {} objects", container, objects.len());
        Ok(Some(objects))
    }

    async fn get(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        let session = self.session().await?;
        let response = self
            .client
            .get(self.url(session, &[container, name])?)
            .header(AUTH_TOKEN_HEADER, &session.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::object_store(format!(
                "GET {}/{} returned {}",
                container, name, status
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Result<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ReportError::object_store(format!("auth response lacks {}", name)))
}
