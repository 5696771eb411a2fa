//! Error types for URL issuance

use strum::Display;
use thiserror::Error;

/// Result type for issuance operations
pub type IssuanceResult<T> = Result<T, IssuanceError>;

/// Result type for signer operations
pub type SignerResult<T> = Result<T, SignerError>;

/// Errors reported by a [`Signer`](crate::signer::Signer) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// Expiration rejected by the provider (e.g. above its maximum)
    #[error("Invalid expiration: {0}")]
    InvalidExpiration(String),

    /// The request could not be built or signed (bucket/key rules, credentials)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The storage service or a credential provider could not be reached
    #[error("Storage service unreachable: {0}")]
    Unreachable(String),

    /// Any other provider failure
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Closed set of issuance failure kinds callers can branch on
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "kebab-case")]
pub enum IssuanceErrorKind {
    /// Malformed input rejected before signing
    InvalidArgument,
    /// A single download URL could not be issued
    DownloadFailed,
    /// A single upload URL could not be issued
    UploadFailed,
    /// At least one member of a batch could not be issued
    BatchFailed,
    /// Invalid issuer configuration
    Config,
}

/// Errors that can occur while issuing pre-signed URLs
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// Invalid input provided
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Signing a download URL failed
    #[error("Failed to generate download URL: {source}")]
    DownloadFailed {
        /// Underlying signer failure
        #[source]
        source: SignerError,
    },

    /// Signing an upload URL failed
    #[error("Failed to generate upload URL: {source}")]
    UploadFailed {
        /// Underlying signer failure
        #[source]
        source: SignerError,
    },

    /// Signing failed for one key of a batch, so the whole batch failed
    #[error("Failed to generate batch download URLs: {key}: {source}")]
    BatchFailed {
        /// The key whose signing failed first
        key: String,
        /// Underlying signer failure
        #[source]
        source: SignerError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IssuanceError {
    /// Returns the failure kind of this error
    #[must_use]
    pub const fn kind(&self) -> IssuanceErrorKind {
        match self {
            Self::InvalidArgument(_) => IssuanceErrorKind::InvalidArgument,
            Self::DownloadFailed { .. } => IssuanceErrorKind::DownloadFailed,
            Self::UploadFailed { .. } => IssuanceErrorKind::UploadFailed,
            Self::BatchFailed { .. } => IssuanceErrorKind::BatchFailed,
            Self::Config(_) => IssuanceErrorKind::Config,
        }
    }

    /// Returns the signer failure behind this error, if any
    #[must_use]
    pub const fn signer_error(&self) -> Option<&SignerError> {
        match self {
            Self::DownloadFailed { source }
            | Self::UploadFailed { source }
            | Self::BatchFailed { source, .. } => Some(source),
            Self::InvalidArgument(_) | Self::Config(_) => None,
        }
    }
}
