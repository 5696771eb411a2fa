//! Types describing what a pre-signed URL authorizes

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

use chrono::{DateTime, Utc};
use strum::Display;

use crate::error::{IssuanceError, IssuanceResult};

/// Default lifetime of an issued URL in seconds (1 hour)
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 60 * 60;

/// Storage operation a URL authorizes
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Download the object
    #[strum(serialize = "GET")]
    Get,
    /// Upload the object
    #[strum(serialize = "PUT")]
    Put,
}

/// The single storage operation a pre-signed URL authorizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    bucket: String,
    key: String,
    operation: Operation,
    content_type: Option<String>,
}

impl ActionDescriptor {
    /// Describes a download of `key` from `bucket`
    #[must_use]
    pub fn download(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            operation: Operation::Get,
            content_type: None,
        }
    }

    /// Describes an upload of `key` into `bucket`
    ///
    /// An empty content type is treated as no content type constraint.
    #[must_use]
    pub fn upload(bucket: &str, key: &str, content_type: Option<&str>) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            operation: Operation::Put,
            content_type: content_type
                .filter(|ct| !ct.is_empty())
                .map(ToString::to_string),
        }
    }

    /// Bucket holding the object
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key within the bucket
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Operation the URL authorizes
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Content type an upload is bound to, always `None` for downloads
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// How long an issued URL stays valid, in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExpirationPolicy(NonZeroU64);

impl ExpirationPolicy {
    /// Creates a policy from a number of seconds
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::InvalidArgument` if `secs` is zero
    pub fn from_secs(secs: u64) -> IssuanceResult<Self> {
        NonZeroU64::new(secs).map(Self).ok_or_else(|| {
            IssuanceError::InvalidArgument("expiration must be a positive number of seconds".into())
        })
    }

    /// Number of seconds the URL stays valid
    #[must_use]
    pub const fn secs(self) -> u64 {
        self.0.get()
    }

    /// The expiration as a `Duration`
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self(NonZeroU64::MIN.saturating_add(DEFAULT_EXPIRES_IN_SECS - 1))
    }
}

/// Pre-signed URL with expiration information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    /// The pre-signed URL, exactly as produced by the signer
    pub url: String,
    /// UTC timestamp when the URL expires
    pub expires_at: DateTime<Utc>,
}

impl PresignedUrl {
    /// The URL as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for PresignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Object key to download URL, one entry per distinct requested key
pub type BatchResult = HashMap<String, PresignedUrl>;
