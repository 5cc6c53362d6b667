//! The seam between bucket handles and the object store.
//!
//! [`BucketRef`](crate::BucketRef) owns the local file handling; a transport
//! only moves bytes between an open file and a bucket key.

use async_trait::async_trait;
use start_sdk_r2_models::UploadOptions;
use tokio::fs::File;

use crate::R2Error;

mod memory;
mod s3;

pub use memory::{MemoryTransport, StoredObject};
pub use s3::S3Transport;

/// What the store reported for one transferred object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectReceipt {
    /// Bytes sent or received.
    pub bytes: u64,
    /// `ETag` of the object, if the store returned one.
    pub e_tag: Option<String>,
}

/// Moves whole objects between local files and a bucket.
///
/// Implementations must not retry: one call is one request.
#[async_trait]
pub trait ObjectTransport: Send + Sync {
    /// Streams the full contents of `body` to `key`, applying `options`
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::Upload`] if the store rejects the request or the
    /// file cannot be read.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: File,
        options: &UploadOptions,
    ) -> Result<ObjectReceipt, R2Error>;

    /// Streams the object at `key` into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::NotFound`] if `key` does not exist, or
    /// [`R2Error::Download`] for any other failure.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut File,
    ) -> Result<ObjectReceipt, R2Error>;
}
