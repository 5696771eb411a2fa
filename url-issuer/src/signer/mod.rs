//! The signing capability behind every issued URL

mod s3;

pub use s3::S3Signer;

use crate::error::SignerResult;
use crate::types::{ActionDescriptor, ExpirationPolicy};

/// Computes the pre-signed URL for one action descriptor
///
/// Implementations hold no per-call mutable state and may be shared across
/// concurrent calls. They may perform network I/O (e.g. to a credential
/// vending service); timeouts are their own concern.
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// Signs `descriptor` so the resulting URL is valid for `expires_in`
    /// from now, returning the URL
    async fn sign(
        &self,
        descriptor: &ActionDescriptor,
        expires_in: ExpirationPolicy,
    ) -> SignerResult<String>;
}

/// Test double for the signer
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    use super::Signer;
    use crate::error::{SignerError, SignerResult};
    use crate::types::{ActionDescriptor, ExpirationPolicy, Operation};

    /// Signer double that echoes its inputs as
    /// `https://stub/{bucket}/{key}?op={operation}&exp={secs}` and records every call
    #[derive(Default)]
    pub struct MockSigner {
        fail_with: Option<SignerError>,
        failing_keys: HashSet<String>,
        delay: Option<Duration>,
        calls: Mutex<Vec<(ActionDescriptor, ExpirationPolicy)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockSigner {
        /// A signer that always succeeds
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A signer that fails every call with `error`
        #[must_use]
        pub fn failing(error: SignerError) -> Self {
            Self {
                fail_with: Some(error),
                ..Self::default()
            }
        }

        /// A signer that fails with `error` only for the given keys
        #[must_use]
        pub fn failing_for_keys(keys: &[&str], error: SignerError) -> Self {
            Self {
                fail_with: Some(error),
                failing_keys: keys.iter().map(ToString::to_string).collect(),
                ..Self::default()
            }
        }

        /// Suspends every successful signing for `delay` before answering
        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Descriptors and expirations received so far
        #[must_use]
        pub fn calls(&self) -> Vec<(ActionDescriptor, ExpirationPolicy)> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of signings requested so far
        #[must_use]
        pub fn call_count(&self) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Highest number of signings observed running at once
        #[must_use]
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        /// Number of signings currently running
        #[must_use]
        pub fn in_flight(&self) -> usize {
            self.in_flight.load(Ordering::SeqCst)
        }

        fn should_fail(&self, key: &str) -> Option<SignerError> {
            self.fail_with
                .as_ref()
                .filter(|_| self.failing_keys.is_empty() || self.failing_keys.contains(key))
                .cloned()
        }
    }

    #[async_trait::async_trait]
    impl Signer for MockSigner {
        async fn sign(
            &self,
            descriptor: &ActionDescriptor,
            expires_in: ExpirationPolicy,
        ) -> SignerResult<String> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((descriptor.clone(), expires_in));

            let _guard = InFlightGuard::enter(&self.in_flight, &self.max_in_flight);

            // Failing keys answer at once, so slower siblings are still running
            if let Some(error) = self.should_fail(descriptor.key()) {
                return Err(error);
            }

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let mut url = format!(
                "https://stub/{}/{}?op={}&exp={}",
                descriptor.bucket(),
                descriptor.key(),
                descriptor.operation(),
                expires_in.secs()
            );
            if let (Operation::Put, Some(content_type)) =
                (descriptor.operation(), descriptor.content_type())
            {
                url.push_str("&content-type=");
                url.push_str(content_type);
            }

            Ok(url)
        }
    }

    /// Counts a signing as running until it completes or is dropped
    struct InFlightGuard<'a> {
        in_flight: &'a AtomicUsize,
    }

    impl<'a> InFlightGuard<'a> {
        fn enter(in_flight: &'a AtomicUsize, max_in_flight: &AtomicUsize) -> Self {
            let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_flight.fetch_max(running, Ordering::SeqCst);
            Self { in_flight }
        }
    }

    impl Drop for InFlightGuard<'_> {
        fn drop(&mut self) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
