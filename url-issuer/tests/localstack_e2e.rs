//! Round trips through `LocalStack`
//!
//! Run with `LocalStack` listening on `localhost:4566`:
//! `cargo test -p url-issuer --test localstack_e2e -- --ignored`

mod common;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Region, Client as S3Client};
use common::*;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use uuid::Uuid;

/// Creates a uniquely named bucket and returns its name
async fn create_test_bucket() -> String {
    let credentials = Credentials::from_keys("test", "test", None);

    let config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(LOCALSTACK_ENDPOINT_URL)
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .load()
        .await;
    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(true)
        .build();
    let s3_client = S3Client::from_conf(s3_config);

    let bucket = format!("url-issuer-{}", Uuid::new_v4());
    s3_client
        .create_bucket()
        .bucket(&bucket)
        .send()
        .await
        .expect("Failed to create test bucket");

    bucket
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_upload_then_download_through_issued_urls() {
    let issuer = s3_issuer().await;
    let bucket = create_test_bucket().await;
    let http = reqwest::Client::new();
    let body = b"id,name\n1,alpha\n".to_vec();

    let upload = issuer
        .issue_upload_url(&bucket, "data/export.csv", Some("text/csv"), 300)
        .await
        .expect("Failed to issue upload URL");

    let response = http
        .put(upload.as_str())
        .header(CONTENT_TYPE, "text/csv")
        .body(body.clone())
        .send()
        .await
        .expect("Upload request failed");
    assert!(response.status().is_success(), "upload: {}", response.status());

    let batch = issuer
        .issue_batch_download_urls(&bucket, &["data/export.csv"], 300)
        .await
        .expect("Failed to issue batch");

    let response = http
        .get(batch["data/export.csv"].as_str())
        .send()
        .await
        .expect("Download request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.expect("Failed to read body").to_vec(), body);
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_upload_with_other_content_type_is_rejected() {
    let issuer = s3_issuer().await;
    let bucket = create_test_bucket().await;

    let upload = issuer
        .issue_upload_url(&bucket, "images/cat.png", Some("image/png"), 300)
        .await
        .expect("Failed to issue upload URL");

    let response = reqwest::Client::new()
        .put(upload.as_str())
        .header(CONTENT_TYPE, "text/html")
        .body("<html></html>")
        .send()
        .await
        .expect("Upload request failed");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
