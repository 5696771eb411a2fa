//! Shared test setup

#![allow(dead_code)]

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};
use url::Url;
use url_issuer::{signer::mock::MockSigner, CredentialSource, IssuerConfig, UrlIssuer};

pub const LOCALSTACK_ENDPOINT_URL: &str = "http://localhost:4566";

/// Installs a test-writer subscriber once per test binary
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Issuer around a recording stub signer
pub fn stub_issuer(signer: MockSigner) -> (UrlIssuer, Arc<MockSigner>) {
    init_tracing();
    let signer = Arc::new(signer);
    (UrlIssuer::new(signer.clone()), signer)
}

/// `LocalStack` configuration with hardcoded credentials, as used in CI
pub fn localstack_config() -> IssuerConfig {
    IssuerConfig {
        region: "us-east-1".to_string(),
        endpoint_url: Some(LOCALSTACK_ENDPOINT_URL.to_string()),
        force_path_style: true,
        credentials: CredentialSource::Static {
            access_key_id: "test".to_string(),
            secret_access_key: "test".to_string(),
            session_token: None,
        },
        batch_concurrency: 8,
    }
}

/// Issuer backed by the S3 presigner, pointed at `LocalStack`
pub async fn s3_issuer() -> UrlIssuer {
    init_tracing();
    UrlIssuer::from_config(&localstack_config())
        .await
        .expect("LocalStack config should be valid")
}

/// Value of a query parameter of `url`
pub fn query_param(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .expect("issued URL should parse")
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
