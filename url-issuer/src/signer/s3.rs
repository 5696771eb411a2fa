//! AWS SDK backed signer

use std::error::Error as StdError;
use std::fmt::Debug;
use std::sync::Arc;

use aws_credential_types::provider::error::CredentialsError;
use aws_sdk_s3::{
    error::{DisplayErrorContext, SdkError},
    presigning::PresigningConfig,
    Client as S3Client,
};
use tracing::debug;

use super::Signer;
use crate::config::IssuerConfig;
use crate::error::{SignerError, SignerResult};
use crate::types::{ActionDescriptor, ExpirationPolicy, Operation};

/// Signs descriptors with the S3 presigner (`SigV4` query authentication)
#[derive(Debug, Clone)]
pub struct S3Signer {
    s3_client: Arc<S3Client>,
}

impl S3Signer {
    /// Creates a signer from a pre-configured S3 client
    #[must_use]
    pub const fn new(s3_client: Arc<S3Client>) -> Self {
        Self { s3_client }
    }

    /// Creates a signer and its S3 client from `config`
    ///
    /// No request is sent to the storage service.
    pub async fn from_config(config: &IssuerConfig) -> Self {
        let s3_client = S3Client::from_conf(config.s3_client_config().await);
        Self::new(Arc::new(s3_client))
    }
}

#[async_trait::async_trait]
impl Signer for S3Signer {
    async fn sign(
        &self,
        descriptor: &ActionDescriptor,
        expires_in: ExpirationPolicy,
    ) -> SignerResult<String> {
        // S3 caps presigned URLs at 7 days
        let presigning_config = PresigningConfig::expires_in(expires_in.as_duration())
            .map_err(|e| SignerError::InvalidExpiration(e.to_string()))?;

        let presigned_request = match descriptor.operation() {
            Operation::Get => self
                .s3_client
                .get_object()
                .bucket(descriptor.bucket())
                .key(descriptor.key())
                .presigned(presigning_config)
                .await
                .map_err(map_sdk_error)?,
            Operation::Put => self
                .s3_client
                .put_object()
                .bucket(descriptor.bucket())
                .key(descriptor.key())
                .set_content_type(descriptor.content_type().map(ToString::to_string))
                .presigned(presigning_config)
                .await
                .map_err(map_sdk_error)?,
        };

        debug!(
            "Presigned {} request for {}/{} with {} signed headers",
            presigned_request.method(),
            descriptor.bucket(),
            descriptor.key(),
            presigned_request.headers().count()
        );

        Ok(presigned_request.uri().to_string())
    }
}

/// Sorts SDK failures into bad input, unreachable service and everything else
///
/// Identity resolution runs in the dispatch phase, so a missing or misconfigured
/// credential chain arrives as a dispatch failure and is told apart by its source.
fn map_sdk_error<E, R>(error: SdkError<E, R>) -> SignerError
where
    E: StdError + 'static,
    R: Debug + 'static,
{
    let message = DisplayErrorContext(&error).to_string();
    match &error {
        SdkError::ConstructionFailure(_) => SignerError::InvalidRequest(message),
        SdkError::TimeoutError(_) => SignerError::Unreachable(message),
        SdkError::DispatchFailure(failure) if failure.is_io() || failure.is_timeout() => {
            SignerError::Unreachable(message)
        }
        SdkError::DispatchFailure(_) => match credentials_error(&error) {
            Some(CredentialsError::ProviderTimedOut(_)) => SignerError::Unreachable(message),
            Some(_) => SignerError::InvalidRequest(message),
            None => SignerError::Unreachable(message),
        },
        _ => SignerError::Provider(message),
    }
}

/// First credential provider failure in the source chain of `error`
fn credentials_error<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a CredentialsError> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(credentials_error) = err.downcast_ref::<CredentialsError>() {
            return Some(credentials_error);
        }
        current = err.source();
    }
    None
}
