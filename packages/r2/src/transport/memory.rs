use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use start_sdk_r2_models::UploadOptions;
use tokio::fs::File;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

use super::{ObjectReceipt, ObjectTransport};
use crate::R2Error;

/// An object held by [`MemoryTransport`], together with the options it was
/// uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object contents.
    pub body: Vec<u8>,
    /// Options passed to the upload that created it.
    pub options: UploadOptions,
    /// Quoted MD5 hex digest, the way S3 reports single-part `ETag`s.
    pub e_tag: String,
}

impl StoredObject {
    fn new(body: Vec<u8>, options: UploadOptions) -> Self {
        let e_tag = format!("\"{:x}\"", md5::compute(&body));
        Self {
            body,
            options,
            e_tag,
        }
    }
}

/// In-process [`ObjectTransport`]. Buckets spring into existence on first
/// write. Counts requests so callers can check that nothing was sent.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl MemoryTransport {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `body` at `bucket`/`key` without going through a file.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject::new(body.into(), UploadOptions::default()),
        );
    }

    /// Returns a copy of the object at `bucket`/`key`.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of `put_object` calls received.
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of `get_object` calls received.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(String, String), StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObjectTransport for MemoryTransport {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: File,
        options: &UploadOptions,
    ) -> Result<ObjectReceipt, R2Error> {
        self.puts.fetch_add(1, Ordering::SeqCst);

        let mut buf = Vec::new();
        body.read_to_end(&mut buf)
            .await
            .map_err(|e| R2Error::upload(bucket, key, e))?;

        let object = StoredObject::new(buf, options.clone());
        let receipt = ObjectReceipt {
            bytes: object.body.len() as u64,
            e_tag: Some(object.e_tag.clone()),
        };
        self.lock()
            .insert((bucket.to_string(), key.to_string()), object);

        Ok(receipt)
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut File,
    ) -> Result<ObjectReceipt, R2Error> {
        self.gets.fetch_add(1, Ordering::SeqCst);

        let object = self
            .object(bucket, key)
            .ok_or_else(|| R2Error::not_found(bucket, key))?;

        sink.write_all(&object.body)
            .await
            .map_err(|e| R2Error::download(bucket, key, e))?;

        Ok(ObjectReceipt {
            bytes: object.body.len() as u64,
            e_tag: Some(object.e_tag),
        })
    }
}
