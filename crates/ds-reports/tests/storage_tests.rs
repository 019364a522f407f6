//! Object store gateway against mocked Swift and S3 APIs, and the sign-and-upload pass

mod common;

use common::{mount_keystone, swift_store_config, SWIFT_ACCOUNT_PATH, SWIFT_TOKEN};
use ds_reports::commands::upload::sign_and_upload;
use ds_reports::signer::FileSigner;
use ds_reports::storage::{Backend, ObjectInfo, ObjectStoreConfig, ObjectStoreGateway, S3Config};
use futures::StreamExt;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTAINER: &str = "ds-reports-2019-07";

fn gateway(server: &MockServer) -> ObjectStoreGateway {
    ObjectStoreGateway::connect(&swift_store_config(server), Duration::from_secs(5)).unwrap()
}

fn object_path(name: &str) -> String {
    format!("{}/{}/{}", SWIFT_ACCOUNT_PATH, CONTAINER, name)
}

#[tokio::test]
async fn test_empty_upload_contacts_nobody() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

    let gateway = gateway(&server);
    let uploaded: Vec<PathBuf> = gateway.upload(Vec::new(), CONTAINER).collect().await;

    assert!(uploaded.is_empty());
}

#[tokio::test]
async fn test_missing_container_lists_none() {
    let server = MockServer::start().await;
    mount_keystone(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", SWIFT_ACCOUNT_PATH, CONTAINER)))
        .and(header("X-Auth-Token", SWIFT_TOKEN))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(gateway(&server).list(CONTAINER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_listing_follows_marker() {
    let server = MockServer::start().await;
    mount_keystone(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("{}/{}", SWIFT_ACCOUNT_PATH, CONTAINER)))
        .and(query_param("marker", "broker-b-2019-07-02.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/{}", SWIFT_ACCOUNT_PATH, CONTAINER)))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "broker-a-2019-07-01.zip", "bytes": 120, "hash": "x" },
            { "name": "broker-b-2019-07-02.zip", "bytes": 80, "hash": "y" }
        ])))
        .with_priority(5)
        .mount(&server)
        .await;

    let objects = gateway(&server).list(CONTAINER).await.unwrap().unwrap();

    assert_eq!(
        objects,
        vec![
            ObjectInfo { name: "broker-a-2019-07-01.zip".to_string(), bytes: 120 },
            ObjectInfo { name: "broker-b-2019-07-02.zip".to_string(), bytes: 80 },
        ]
    );
}

#[tokio::test]
async fn test_get_returns_object_bytes() {
    let server = MockServer::start().await;
    mount_keystone(&server).await;
    Mock::given(method("GET"))
        .and(path(object_path("broker-a-2019-07-01.zip")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04".to_vec()))
        .mount(&server)
        .await;

    let data = gateway(&server).get(CONTAINER, "broker-a-2019-07-01.zip").await.unwrap();
    assert_eq!(data, b"PK\x03\x04");
}

#[tokio::test]
async fn test_sign_and_upload_removes_only_uploaded_archives() {
    let server = MockServer::start().await;
    mount_keystone(&server).await;

    Mock::given(method("PUT"))
        .and(path(format!("{}/{}", SWIFT_ACCOUNT_PATH, CONTAINER)))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(object_path("alice-2019-07-31.zip")))
        .and(header("X-Auth-Token", SWIFT_TOKEN))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(object_path("bob-2019-07-30.zip")))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(object_path("carol-2019-07-31.zip")))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("alice-2019-07-31.csv"), "TIMESTAMP,DOC_ID,DOC_HASH,REMOTE_ADDR\n").unwrap();
    std::fs::write(dir.path().join("carol-2019-07-31.csv"), "TIMESTAMP,DOC_ID,DOC_HASH,REMOTE_ADDR\n").unwrap();
    // Archive left behind by an earlier run whose upload failed
    std::fs::write(dir.path().join("bob-2019-07-30.zip"), b"PK").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let signer = FileSigner::new(None, Duration::from_secs(5)).unwrap();
    let uploaded = sign_and_upload(&signer, &gateway(&server), dir.path(), CONTAINER).await.unwrap();

    assert_eq!(
        uploaded,
        vec![dir.path().join("alice-2019-07-31.zip"), dir.path().join("bob-2019-07-30.zip")]
    );
    assert!(!dir.path().join("alice-2019-07-31.zip").exists());
    assert!(!dir.path().join("alice-2019-07-31.csv").exists());
    assert!(dir.path().join("carol-2019-07-31.zip").exists());
    assert!(dir.path().join("notes.txt").exists());
}

#[tokio::test]
async fn test_sign_and_upload_without_directory() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let signer = FileSigner::new(None, Duration::from_secs(5)).unwrap();

    let uploaded = sign_and_upload(&signer, &gateway(&server), &dir.path().join("absent"), CONTAINER)
        .await
        .unwrap();

    assert!(uploaded.is_empty());
}

// ============================================================================
// S3 backend
// ============================================================================

fn s3_gateway(server: &MockServer) -> ObjectStoreGateway {
    let config = ObjectStoreConfig {
        backend: Backend::S3,
        container_prefix: "ds-reports".to_string(),
        put_container: None,
        get_container: None,
        insecure: false,
        swift: None,
        s3: Some(S3Config::for_minio(server.uri())),
    };
    ObjectStoreGateway::connect(&config, Duration::from_secs(5)).unwrap()
}

fn xml(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).insert_header("content-type", "application/xml").set_body_string(body)
}

fn list_page(keys: &[(&str, u64)], next_token: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|(key, size)| format!("<Contents><Key>{}</Key><Size>{}</Size></Contents>", key, size))
        .collect();
    let continuation = next_token
        .map(|t| format!("<NextContinuationToken>{}</NextContinuationToken>", t))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>{}</Name><Prefix></Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys><IsTruncated>{}</IsTruncated>{}{}</ListBucketResult>"#,
        CONTAINER,
        keys.len(),
        next_token.is_some(),
        continuation,
        contents
    )
}

#[tokio::test]
async fn test_s3_missing_bucket_lists_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", CONTAINER)))
        .and(query_param("list-type", "2"))
        .respond_with(xml(
            404,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchBucket</Code><Message>The specified bucket does not exist</Message><BucketName>ds-reports-2019-07</BucketName></Error>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    assert!(s3_gateway(&server).list(CONTAINER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_s3_other_list_failure_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", CONTAINER)))
        .respond_with(xml(
            403,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>"#,
        ))
        .mount(&server)
        .await;

    assert!(s3_gateway(&server).list(CONTAINER).await.is_err());
}

#[tokio::test]
async fn test_s3_listing_follows_continuation_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/{}", CONTAINER)))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(xml(200, &list_page(&[("broker-b-2019-07-02.zip", 80)], None)))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{}", CONTAINER)))
        .and(query_param("list-type", "2"))
        .and(query_param_is_missing("continuation-token"))
        .respond_with(xml(200, &list_page(&[("broker-a-2019-07-01.zip", 120)], Some("page-2"))))
        .with_priority(5)
        .expect(1)
        .mount(&server)
        .await;

    let objects = s3_gateway(&server).list(CONTAINER).await.unwrap().unwrap();

    assert_eq!(
        objects,
        vec![
            ObjectInfo { name: "broker-a-2019-07-01.zip".to_string(), bytes: 120 },
            ObjectInfo { name: "broker-b-2019-07-02.zip".to_string(), bytes: 80 },
        ]
    );
}

#[tokio::test]
async fn test_s3_upload_creates_bucket_then_stores_by_base_name() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path(format!("/{}", CONTAINER)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}", CONTAINER)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/alice-2019-07-31.zip", CONTAINER)))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"d41d8cd98f00b204e9800998ecf8427e\""))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/bob-2019-07-31.zip", CONTAINER)))
        .respond_with(xml(
            403,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>"#,
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let alice = dir.path().join("alice-2019-07-31.zip");
    let bob = dir.path().join("bob-2019-07-31.zip");
    std::fs::write(&alice, b"PK alice").unwrap();
    std::fs::write(&bob, b"PK bob").unwrap();

    let gateway = s3_gateway(&server);
    let uploaded: Vec<PathBuf> = gateway.upload(vec![alice.clone(), bob], CONTAINER).collect().await;

    assert_eq!(uploaded, vec![alice]);
    let stored = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path().ends_with("/alice-2019-07-31.zip"))
        .unwrap();
    assert!(stored.body.windows(8).any(|w| w == b"PK alice"));
}

#[tokio::test]
async fn test_s3_get_returns_object_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/broker-a-2019-07-01.zip", CONTAINER)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let data = s3_gateway(&server).get(CONTAINER, "broker-a-2019-07-01.zip").await.unwrap();
    assert_eq!(data, b"PK\x03\x04");
}
