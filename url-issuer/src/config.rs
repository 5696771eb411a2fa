//! Configuration for reaching the storage service

use std::env;
use std::fmt;
use std::time::Duration;

use aws_config::{timeout::TimeoutConfig, BehaviorVersion};
use aws_sdk_s3::config::{Credentials, Region};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::{IssuanceError, IssuanceResult};

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default number of signings a batch runs concurrently
pub const DEFAULT_BATCH_CONCURRENCY: usize = 16;

/// `LocalStack` endpoint used in development
const LOCALSTACK_ENDPOINT_URL: &str = "http://localhost:4566";

/// SDK operation timeout, bounds credential resolution during signing
const OPERATION_TIMEOUT_SECS: u64 = 30;

/// Provider name attached to static credentials
const STATIC_CREDENTIALS_PROVIDER: &str = "url-issuer-static";

/// Deployment stage, read from `APP_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// Defaults to development when unset.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::Config` if `APP_ENV` contains an invalid value
    pub fn from_env() -> IssuanceResult<Self> {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            _ => Err(IssuanceError::Config(format!("Invalid environment: {env}"))),
        }
    }

    /// Endpoint to use when `S3_ENDPOINT_URL` is not set
    #[must_use]
    pub const fn default_endpoint_url(self) -> Option<&'static str> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            Self::Development => Some(LOCALSTACK_ENDPOINT_URL),
        }
    }

    /// `LocalStack` only serves path-style bucket addressing
    #[must_use]
    pub const fn force_path_style(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Where the signer gets its credentials from
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    /// The AWS default provider chain (env vars, profile, web identity, IMDS)
    #[default]
    DefaultChain,
    /// Fixed keys
    Static {
        /// Access key id
        access_key_id: String,
        /// Secret access key
        secret_access_key: String,
        /// Optional session token for temporary credentials
        #[serde(default)]
        session_token: Option<String>,
    },
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultChain => f.write_str("DefaultChain"),
            Self::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"** redacted **")
                .finish_non_exhaustive(),
        }
    }
}

/// Settings for reaching the storage service, validated once at construction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Signing region
    pub region: String,
    /// Custom endpoint, e.g. `LocalStack` or an S3-compatible service
    pub endpoint_url: Option<String>,
    /// Address buckets as `endpoint/bucket/key` instead of `bucket.endpoint/key`
    pub force_path_style: bool,
    /// Credential source
    pub credentials: CredentialSource,
    /// Maximum signings in flight for one batch
    pub batch_concurrency: usize,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            force_path_style: false,
            credentials: CredentialSource::DefaultChain,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

impl IssuerConfig {
    /// Builds the configuration from environment variables
    ///
    /// Reads `APP_ENV`, `AWS_REGION`, `S3_ENDPOINT_URL` and
    /// `PRESIGN_BATCH_CONCURRENCY`. Credentials always come from the default chain.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::Config` if `APP_ENV` is invalid or the result
    /// fails validation
    pub fn from_env() -> IssuanceResult<Self> {
        let environment = Environment::from_env()?;

        let region = env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());

        let endpoint_url = env::var("S3_ENDPOINT_URL")
            .ok()
            .or_else(|| environment.default_endpoint_url().map(ToString::to_string));

        let batch_concurrency = match env::var("PRESIGN_BATCH_CONCURRENCY") {
            Ok(val) => val.parse::<usize>().unwrap_or_else(|_| {
                warn!("Ignoring invalid PRESIGN_BATCH_CONCURRENCY: {val}");
                DEFAULT_BATCH_CONCURRENCY
            }),
            Err(_) => DEFAULT_BATCH_CONCURRENCY,
        };

        let config = Self {
            region,
            endpoint_url,
            force_path_style: environment.force_path_style(),
            credentials: CredentialSource::DefaultChain,
            batch_concurrency,
        };
        config.validate()?;

        Ok(config)
    }

    /// Checks the recognized fields
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::Config` describing the first invalid field
    pub fn validate(&self) -> IssuanceResult<()> {
        if self.region.trim().is_empty() {
            return Err(IssuanceError::Config("region must not be empty".into()));
        }

        if let Some(endpoint_url) = &self.endpoint_url {
            let valid = Url::parse(endpoint_url).is_ok_and(|url| {
                matches!(url.scheme(), "http" | "https")
                    && url.host_str().is_some_and(|host| !host.is_empty())
            });
            if !valid {
                return Err(IssuanceError::Config(format!(
                    "endpoint_url must be an http(s) URL with a host, got: {endpoint_url:?}"
                )));
            }
        }

        if let CredentialSource::Static {
            access_key_id,
            secret_access_key,
            ..
        } = &self.credentials
        {
            if access_key_id.is_empty() || secret_access_key.is_empty() {
                return Err(IssuanceError::Config(
                    "static credentials require an access key id and a secret access key".into(),
                ));
            }
        }

        if self.batch_concurrency == 0 {
            return Err(IssuanceError::Config(
                "batch_concurrency must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// AWS S3 client configuration
    ///
    /// The region is set explicitly and credentials resolve lazily, so this
    /// does not contact the storage service.
    pub async fn s3_client_config(&self) -> aws_sdk_s3::Config {
        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(OPERATION_TIMEOUT_SECS))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        if let CredentialSource::Static {
            access_key_id,
            secret_access_key,
            session_token,
        } = &self.credentials
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                session_token.clone(),
                None,
                STATIC_CREDENTIALS_PROVIDER,
            ));
        }

        let aws_config = loader.load().await;
        let s3_config: aws_sdk_s3::Config = (&aws_config).into();
        let mut builder = s3_config.to_builder();
        builder.set_force_path_style(Some(self.force_path_style));

        builder.build()
    }
}
