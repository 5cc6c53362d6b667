use std::sync::Arc;

use aws_config::Region;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};

use crate::{BucketRef, ObjectTransport, R2Credentials, S3Transport};

/// Handle to one R2 account. Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct R2Client {
    transport: Arc<dyn ObjectTransport>,
}

impl R2Client {
    /// Creates a client talking to R2 over the S3 API.
    #[must_use]
    pub fn new(credentials: &R2Credentials) -> Self {
        log::debug!("Creating R2 client for {}", credentials.endpoint_url());
        Self::with_transport(Arc::new(S3Transport::new(credentials)))
    }

    /// Creates a client over any transport, e.g. a
    /// [`MemoryTransport`](crate::MemoryTransport).
    #[must_use]
    pub fn with_transport(transport: Arc<dyn ObjectTransport>) -> Self {
        Self { transport }
    }

    /// Returns a reference to bucket `name`. No request is made, so a
    /// missing bucket only shows up on the first transfer.
    #[must_use]
    pub fn resolve_bucket(&self, name: impl Into<String>) -> BucketRef {
        BucketRef::new(name.into(), Arc::clone(&self.transport))
    }
}

impl std::fmt::Debug for R2Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Client").finish_non_exhaustive()
    }
}

/// Builds the `aws-sdk-s3` client for an R2 account.
pub(crate) fn build_s3_client(credentials: &R2Credentials) -> aws_sdk_s3::Client {
    aws_sdk_s3::Client::from_conf(s3_config(credentials).build())
}

/// SDK configuration for an R2 account. The SDK's own retries are turned
/// off so that one transfer is exactly one request.
pub(crate) fn s3_config(credentials: &R2Credentials) -> aws_sdk_s3::config::Builder {
    let creds = Credentials::new(
        credentials.access_key_id(),
        credentials.secret_access_key(),
        None,
        None,
        "r2-settings",
    );

    aws_sdk_s3::Config::builder()
        .endpoint_url(credentials.endpoint_url())
        .region(Region::new(credentials.region().to_string()))
        .credentials_provider(creds)
        .force_path_style(true)
        .retry_config(RetryConfig::disabled())
        .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn s3_client_uses_configured_region() {
        let credentials = R2Credentials::new("acct", "weur", "key", "secret").unwrap();
        let client = build_s3_client(&credentials);
        assert_eq!(
            client.config().region().map(ToString::to_string).as_deref(),
            Some("weur")
        );
    }

    #[tokio::test]
    async fn s3_client_makes_a_single_attempt() {
        let client = build_s3_client(&R2Credentials::default());
        assert_eq!(
            client.config().retry_config().map(RetryConfig::max_attempts),
            Some(1)
        );
    }

    #[tokio::test]
    async fn resolving_a_bucket_keeps_its_name() {
        let client = R2Credentials::default().client();
        let bucket = client.resolve_bucket("archive");
        assert_eq!(bucket.name(), "archive");
    }
}
