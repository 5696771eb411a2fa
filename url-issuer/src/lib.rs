//! Time-limited, capability-scoped access URLs for objects in S3-compatible storage
//!
//! A [`UrlIssuer`] turns download, upload and batch download requests into
//! pre-signed URLs. The signing itself is delegated to a [`Signer`]; the
//! production [`S3Signer`] uses the AWS SDK presigner, so credentials never
//! leave the issuing process.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Storage service configuration
pub mod config;

/// Error types
pub mod error;

/// URL issuance operations
pub mod issuer;

/// Signing capability
pub mod signer;

/// Descriptors, expirations and issued URLs
pub mod types;

pub use config::{CredentialSource, Environment, IssuerConfig};
pub use error::{IssuanceError, IssuanceErrorKind, IssuanceResult, SignerError, SignerResult};
pub use issuer::UrlIssuer;
pub use signer::{S3Signer, Signer};
pub use types::{
    ActionDescriptor, BatchResult, ExpirationPolicy, Operation, PresignedUrl,
    DEFAULT_EXPIRES_IN_SECS,
};
