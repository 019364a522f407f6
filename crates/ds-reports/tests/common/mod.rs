//! Shared fixtures for integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use ds_reports::clock::Sleeper;
use ds_reports::mail::{MailSender, OutgoingMail};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records pauses without waiting
#[derive(Default)]
pub struct RecordingSleeper {
    pub calls: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

/// Keeps every message instead of delivering it
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl MailSender for RecordingSender {
    async fn send(&self, mail: &OutgoingMail) -> ds_reports::Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// One log-store hit sorted at `millis`
pub fn es_hit(user: &str, doc_id: &str, millis: i64) -> Value {
    json!({
        "_index": "logs-2019.07.31",
        "_source": {
            "USER": user,
            "REMOTE_ADDR": "10.0.0.1",
            "DOC_ID": doc_id,
            "DOC_HASH": format!("md5:{}", doc_id),
            "TIMESTAMP": "2019-07-31T10:00:00+03:00",
            "@timestamp": "2019-07-31T07:00:00.000Z"
        },
        "sort": [millis, format!("log#{}", doc_id)]
    })
}

/// `_msearch` response wrapping `hits`
pub fn es_page(hits: Vec<Value>) -> Value {
    json!({
        "responses": [{
            "took": 3,
            "hits": { "total": hits.len(), "hits": hits },
            "status": 200
        }]
    })
}

/// Captures formatted log lines of a scoped subscriber
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Subscriber writing plain lines into this capture
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let capture = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || capture.clone())
            .finish()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub const SWIFT_TOKEN: &str = "gAAAAAB-test-token";
pub const SWIFT_ACCOUNT_PATH: &str = "/v1/AUTH_reports";

/// Keystone v3 token endpoint whose catalog points object storage at `server`
pub async fn mount_keystone(server: &MockServer) {
    let catalog = json!({
        "token": {
            "expires_at": "2099-01-01T00:00:00.000000Z",
            "catalog": [{
                "type": "object-store",
                "name": "swift",
                "endpoints": [
                    { "interface": "public", "region": "RegionOne",
                      "url": format!("{}{}", server.uri(), SWIFT_ACCOUNT_PATH) },
                    { "interface": "internal", "region": "RegionOne",
                      "url": "http://internal.invalid/v1/AUTH_reports" }
                ]
            }]
        }
    });

    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("X-Subject-Token", SWIFT_TOKEN)
                .set_body_json(catalog),
        )
        .mount(server)
        .await;
}

/// Object store settings for a Swift mock at `server`
pub fn swift_store_config(server: &MockServer) -> ds_reports::storage::ObjectStoreConfig {
    serde_yaml::from_str(&format!(
        r#"
container_prefix: ds-reports
swift:
  auth_url: {}/v3
  username: reporter
  password: secret
  project_name: reports
"#,
        server.uri()
    ))
    .unwrap()
}
