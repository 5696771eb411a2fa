//! Issues pre-signed download and upload URLs

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{IssuerConfig, DEFAULT_BATCH_CONCURRENCY};
use crate::error::{IssuanceError, IssuanceResult, SignerResult};
use crate::signer::{S3Signer, Signer};
use crate::types::{
    ActionDescriptor, BatchResult, ExpirationPolicy, PresignedUrl, DEFAULT_EXPIRES_IN_SECS,
};

/// Turns issuance requests into signed, time-bounded URLs
///
/// The signer is shared read-only, so one issuer can serve concurrent calls
/// of all three operations without locking.
#[derive(Clone)]
pub struct UrlIssuer {
    signer: Arc<dyn Signer>,
    batch_concurrency: usize,
}

impl UrlIssuer {
    /// Creates an issuer around an existing signer
    #[must_use]
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            signer,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    /// Creates an issuer backed by the S3 presigner
    ///
    /// The configuration is validated here; the storage service is not contacted.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::Config` if the configuration is invalid
    pub async fn from_config(config: &IssuerConfig) -> IssuanceResult<Self> {
        config.validate()?;

        let signer = S3Signer::from_config(config).await;

        info!(
            "Initialized URL issuer for region {} (endpoint: {}, batch concurrency: {})",
            config.region,
            config.endpoint_url.as_deref().unwrap_or("default"),
            config.batch_concurrency
        );

        Ok(Self::new(Arc::new(signer)).with_batch_concurrency(config.batch_concurrency))
    }

    /// Caps the number of signings a batch runs at once (at least 1)
    #[must_use]
    pub fn with_batch_concurrency(mut self, batch_concurrency: usize) -> Self {
        self.batch_concurrency = batch_concurrency.max(1);
        self
    }

    /// Maximum signings in flight for one batch
    #[must_use]
    pub const fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }

    /// Issues a URL that lets the bearer download `key` from `bucket`
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::InvalidArgument` if `bucket` or `key` is empty or
    /// `expires_in_secs` is zero, without signing anything.
    /// Returns `IssuanceError::DownloadFailed` if signing fails, e.g. when the
    /// expiration exceeds the provider maximum.
    #[instrument(skip(self))]
    pub async fn issue_download_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in_secs: u64,
    ) -> IssuanceResult<PresignedUrl> {
        let expires_in = validate_target(bucket, expires_in_secs)
            .and_then(|expires_in| validate_key(key).map(|()| expires_in))
            .inspect_err(|e| warn!("Rejected download URL request: {e}"))?;

        let descriptor = ActionDescriptor::download(bucket, key);
        let presigned_url = self
            .sign(&descriptor, expires_in)
            .await
            .map_err(|source| {
                error!("Failed to sign download URL for {bucket}/{key}: {source}");
                IssuanceError::DownloadFailed { source }
            })?;

        debug!(
            "Issued download URL for {}/{} expiring at {}",
            bucket, key, presigned_url.expires_at
        );

        Ok(presigned_url)
    }

    /// [`issue_download_url`](Self::issue_download_url) with the default
    /// one hour expiration
    ///
    /// # Errors
    ///
    /// See [`issue_download_url`](Self::issue_download_url)
    pub async fn issue_download_url_default(
        &self,
        bucket: &str,
        key: &str,
    ) -> IssuanceResult<PresignedUrl> {
        self.issue_download_url(bucket, key, DEFAULT_EXPIRES_IN_SECS)
            .await
    }

    /// Issues a URL that lets the bearer upload `key` into `bucket`
    ///
    /// When `content_type` is given, the URL is bound to it: the storage
    /// provider rejects an upload whose `Content-Type` header differs.
    /// `None` or an empty string leaves the content type unconstrained.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::InvalidArgument` if `bucket` or `key` is empty or
    /// `expires_in_secs` is zero, without signing anything.
    /// Returns `IssuanceError::UploadFailed` if signing fails.
    #[instrument(skip(self))]
    pub async fn issue_upload_url(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        expires_in_secs: u64,
    ) -> IssuanceResult<PresignedUrl> {
        let expires_in = validate_target(bucket, expires_in_secs)
            .and_then(|expires_in| validate_key(key).map(|()| expires_in))
            .inspect_err(|e| warn!("Rejected upload URL request: {e}"))?;

        let descriptor = ActionDescriptor::upload(bucket, key, content_type);
        let presigned_url = self
            .sign(&descriptor, expires_in)
            .await
            .map_err(|source| {
                error!("Failed to sign upload URL for {bucket}/{key}: {source}");
                IssuanceError::UploadFailed { source }
            })?;

        debug!(
            "Issued upload URL for {}/{} expiring at {}",
            bucket, key, presigned_url.expires_at
        );

        Ok(presigned_url)
    }

    /// [`issue_upload_url`](Self::issue_upload_url) with the default
    /// one hour expiration
    ///
    /// # Errors
    ///
    /// See [`issue_upload_url`](Self::issue_upload_url)
    pub async fn issue_upload_url_default(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> IssuanceResult<PresignedUrl> {
        self.issue_upload_url(bucket, key, content_type, DEFAULT_EXPIRES_IN_SECS)
            .await
    }

    /// Issues one download URL per distinct key, sharing bucket and expiration
    ///
    /// Either every key gets a URL or the whole call fails; no partial result
    /// is returned. Duplicate keys are signed once. An empty `keys` yields an
    /// empty map without signing anything.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::InvalidArgument` if `bucket` or any key is empty
    /// or `expires_in_secs` is zero, without signing anything.
    /// Returns `IssuanceError::BatchFailed` for the first key whose signing fails.
    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    pub async fn issue_batch_download_urls<K>(
        &self,
        bucket: &str,
        keys: &[K],
        expires_in_secs: u64,
    ) -> IssuanceResult<BatchResult>
    where
        K: AsRef<str> + Sync,
    {
        let expires_in = validate_target(bucket, expires_in_secs)
            .and_then(|expires_in| {
                keys.iter()
                    .try_for_each(|key| validate_key(key.as_ref()))
                    .map(|()| expires_in)
            })
            .inspect_err(|e| warn!("Rejected batch download URL request: {e}"))?;

        let unique_keys: HashSet<&str> = keys.iter().map(AsRef::as_ref).collect();
        if unique_keys.is_empty() {
            return Ok(BatchResult::new());
        }

        let key_count = unique_keys.len();
        // The first error ends the stream and drops in-flight signings
        let urls = stream::iter(unique_keys)
            .map(|key| async move {
                let descriptor = ActionDescriptor::download(bucket, key);
                self.sign(&descriptor, expires_in)
                    .await
                    .map(|presigned_url| (key.to_string(), presigned_url))
                    .map_err(|source| {
                        error!("Failed to sign batch download URL for {bucket}/{key}: {source}");
                        IssuanceError::BatchFailed {
                            key: key.to_string(),
                            source,
                        }
                    })
            })
            .buffer_unordered(self.batch_concurrency)
            .try_collect::<BatchResult>()
            .await?;

        debug!("Issued {key_count} download URLs for bucket {bucket}");

        Ok(urls)
    }

    /// [`issue_batch_download_urls`](Self::issue_batch_download_urls) with the
    /// default one hour expiration
    ///
    /// # Errors
    ///
    /// See [`issue_batch_download_urls`](Self::issue_batch_download_urls)
    pub async fn issue_batch_download_urls_default<K>(
        &self,
        bucket: &str,
        keys: &[K],
    ) -> IssuanceResult<BatchResult>
    where
        K: AsRef<str> + Sync,
    {
        self.issue_batch_download_urls(bucket, keys, DEFAULT_EXPIRES_IN_SECS)
            .await
    }

    async fn sign(
        &self,
        descriptor: &ActionDescriptor,
        expires_in: ExpirationPolicy,
    ) -> SignerResult<PresignedUrl> {
        let issued_at = Utc::now();
        let url = self.signer.sign(descriptor, expires_in).await?;

        Ok(PresignedUrl {
            url,
            expires_at: expires_at(issued_at, expires_in),
        })
    }
}

/// Deadline of a URL issued at `issued_at`, saturating at the latest representable time
fn expires_at(issued_at: DateTime<Utc>, expires_in: ExpirationPolicy) -> DateTime<Utc> {
    i64::try_from(expires_in.secs())
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn validate_target(bucket: &str, expires_in_secs: u64) -> IssuanceResult<ExpirationPolicy> {
    if bucket.is_empty() {
        return Err(IssuanceError::InvalidArgument(
            "bucket must not be empty".into(),
        ));
    }

    ExpirationPolicy::from_secs(expires_in_secs)
}

fn validate_key(key: &str) -> IssuanceResult<()> {
    if key.is_empty() {
        return Err(IssuanceError::InvalidArgument(
            "object key must not be empty".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IssuanceErrorKind, SignerError};
    use crate::signer::mock::MockSigner;
    use crate::types::Operation;

    fn issuer_with(signer: &Arc<MockSigner>) -> UrlIssuer {
        UrlIssuer::new(signer.clone())
    }

    #[tokio::test]
    async fn test_download_url_echoes_descriptor() {
        let signer = Arc::new(MockSigner::new());
        let issuer = issuer_with(&signer);

        let url = issuer
            .issue_download_url("my-bucket", "reports/q1.pdf", 900)
            .await
            .unwrap();

        assert_eq!(url.as_str(), "https://stub/my-bucket/reports/q1.pdf?op=GET&exp=900");

        let calls = signer.calls();
        assert_eq!(calls.len(), 1);
        let (descriptor, expires_in) = &calls[0];
        assert_eq!(descriptor.operation(), Operation::Get);
        assert_eq!(descriptor.content_type(), None);
        assert_eq!(expires_in.secs(), 900);
    }

    #[tokio::test]
    async fn test_expires_at_follows_expiration() {
        let issuer = UrlIssuer::new(Arc::new(MockSigner::new()));

        let before = Utc::now();
        let url = issuer.issue_download_url("b", "k", 900).await.unwrap();
        let after = Utc::now();

        assert!(url.expires_at >= before + TimeDelta::try_seconds(900).unwrap());
        assert!(url.expires_at <= after + TimeDelta::try_seconds(900).unwrap());
    }

    #[test]
    fn test_expires_at_saturates() {
        let policy = ExpirationPolicy::from_secs(u64::MAX).unwrap();
        assert_eq!(expires_at(Utc::now(), policy), DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test]
    async fn test_invalid_arguments_skip_signer() {
        let signer = Arc::new(MockSigner::new());
        let issuer = issuer_with(&signer);

        let err = issuer.issue_download_url("", "k", 60).await.unwrap_err();
        assert_eq!(err.kind(), IssuanceErrorKind::InvalidArgument);

        let err = issuer.issue_download_url("b", "", 60).await.unwrap_err();
        assert_eq!(err.kind(), IssuanceErrorKind::InvalidArgument);

        let err = issuer
            .issue_upload_url("b", "k", Some("text/plain"), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), IssuanceErrorKind::InvalidArgument);

        let err = issuer
            .issue_batch_download_urls("b", &["a", ""], 60)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), IssuanceErrorKind::InvalidArgument);

        assert_eq!(signer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_download_failure_wraps_signer_error() {
        let issuer = UrlIssuer::new(Arc::new(MockSigner::failing(
            SignerError::InvalidExpiration("too long".to_string()),
        )));

        let err = issuer.issue_download_url("b", "k", 60).await.unwrap_err();

        assert_eq!(err.kind(), IssuanceErrorKind::DownloadFailed);
        assert!(err.to_string().contains("too long"));
        assert_eq!(
            err.signer_error(),
            Some(&SignerError::InvalidExpiration("too long".to_string()))
        );
    }

    #[test]
    fn test_batch_concurrency_floor() {
        let issuer = UrlIssuer::new(Arc::new(MockSigner::new()));
        assert_eq!(issuer.batch_concurrency(), DEFAULT_BATCH_CONCURRENCY);
        assert_eq!(issuer.with_batch_concurrency(0).batch_concurrency(), 1);
    }
}
