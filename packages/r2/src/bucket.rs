use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use start_sdk_r2_models::{TransferResult, UploadOptions};
use tokio::io::AsyncWriteExt as _;

use crate::{ObjectReceipt, ObjectTransport, R2Client, R2Credentials, R2Error};

/// A named bucket on a resolved client.
#[derive(Clone)]
pub struct BucketRef {
    name: String,
    transport: Arc<dyn ObjectTransport>,
}

impl BucketRef {
    pub(crate) fn new(name: String, transport: Arc<dyn ObjectTransport>) -> Self {
        Self { name, transport }
    }

    /// Bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uploads the contents of `local_path` to `remote_path`.
    ///
    /// `options` is forwarded to the store unchanged. The local file is
    /// opened before anything is sent, so a missing file never reaches the
    /// network.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::LocalFileNotFound`] if `local_path` does not exist,
    /// [`R2Error::Io`] if it cannot be opened, or [`R2Error::Upload`] if the
    /// store rejects the request.
    pub async fn upload(
        &self,
        local_path: impl AsRef<Path>,
        remote_path: &str,
        options: &UploadOptions,
    ) -> Result<TransferResult, R2Error> {
        let local_path = local_path.as_ref();

        let file = match tokio::fs::File::open(local_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(R2Error::LocalFileNotFound {
                    path: local_path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(R2Error::Io {
                    path: local_path.to_path_buf(),
                    source,
                });
            }
        };

        log::info!(
            "Pushing {} -> s3://{}/{remote_path}",
            local_path.display(),
            self.name
        );

        let receipt = self
            .transport
            .put_object(&self.name, remote_path, file, options)
            .await?;

        log::info!("  uploaded {remote_path} ({})", format_size(receipt.bytes));
        Ok(self.result(remote_path, receipt))
    }

    /// Downloads `remote_path` into `local_path`.
    ///
    /// Data is written to a fresh `<local_path>.<uuid>.part` file and moved
    /// into place only once the transfer has finished, so a failed download
    /// leaves any existing file at `local_path` untouched and no partial file
    /// behind. Existing files are never opened for writing except by the final
    /// rename over `local_path`.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::NotFound`] if `remote_path` does not exist,
    /// [`R2Error::Download`] on other store failures, or [`R2Error::Io`] if
    /// the local file cannot be written.
    pub async fn download(
        &self,
        remote_path: &str,
        local_path: impl AsRef<Path>,
    ) -> Result<TransferResult, R2Error> {
        let local_path = local_path.as_ref();
        let partial = partial_path(local_path);

        log::info!(
            "Pulling s3://{}/{remote_path} -> {}",
            self.name,
            local_path.display()
        );

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&partial)
            .await
            .map_err(|source| R2Error::Io {
                path: partial.clone(),
                source,
            })?;

        let received = self
            .transport
            .get_object(&self.name, remote_path, &mut file)
            .await;
        let outcome = match received {
            Ok(receipt) => file
                .flush()
                .await
                .map(|()| receipt)
                .map_err(|source| R2Error::Io {
                    path: partial.clone(),
                    source,
                }),
            Err(e) => Err(e),
        };
        drop(file);

        let outcome = match outcome {
            Ok(receipt) => tokio::fs::rename(&partial, local_path)
                .await
                .map(|()| receipt)
                .map_err(|source| R2Error::Io {
                    path: local_path.to_path_buf(),
                    source,
                }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(receipt) => {
                log::info!(
                    "  downloaded {} ({})",
                    local_path.display(),
                    format_size(receipt.bytes)
                );
                Ok(self.result(remote_path, receipt))
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    log::warn!(
                        "  failed to remove partial download {}: {cleanup}",
                        partial.display()
                    );
                }
                Err(e)
            }
        }
    }

    fn result(&self, key: &str, receipt: ObjectReceipt) -> TransferResult {
        TransferResult {
            bucket: self.name.clone(),
            key: key.to_string(),
            bytes: receipt.bytes,
            e_tag: receipt.e_tag,
        }
    }
}

impl std::fmt::Debug for BucketRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Credentials plus a bucket name, with upload/download helpers.
///
/// The client is built on first use and reused by later calls on the same
/// handle. Handles never share state with each other.
///
/// ```no_run
/// use start_sdk_r2::{R2Bucket, UploadOptions};
///
/// # async fn run() -> Result<(), start_sdk_r2::R2Error> {
/// let bucket = R2Bucket::from_env("reports")?;
/// let options = UploadOptions::default().with_content_type("application/pdf");
/// bucket.upload("q1.pdf", "2024/q1.pdf", &options).await?;
/// bucket.download("2024/q1.pdf", "q1-copy.pdf").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct R2Bucket {
    credentials: R2Credentials,
    name: String,
    client: OnceLock<R2Client>,
}

impl R2Bucket {
    /// Creates a handle for bucket `name`.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::InvalidConfig`] if `name` is empty. Other naming
    /// rules are left to R2.
    pub fn new(credentials: R2Credentials, name: impl Into<String>) -> Result<Self, R2Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(R2Error::InvalidConfig {
                field: "bucket name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(Self {
            credentials,
            name,
            client: OnceLock::new(),
        })
    }

    /// Creates a handle using credentials from the environment and `.env`.
    ///
    /// # Errors
    ///
    /// See [`R2Credentials::from_env`] and [`R2Bucket::new`].
    pub fn from_env(name: impl Into<String>) -> Result<Self, R2Error> {
        Self::new(R2Credentials::from_env()?, name)
    }

    /// Replaces the lazily built client with `client`.
    #[must_use]
    pub fn with_client(self, client: R2Client) -> Self {
        Self {
            client: OnceLock::from(client),
            ..self
        }
    }

    /// Bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Credentials this handle was built from.
    #[must_use]
    pub const fn credentials(&self) -> &R2Credentials {
        &self.credentials
    }

    /// Endpoint URL of the account.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        self.credentials.endpoint_url()
    }

    /// The client, built on first call.
    #[must_use]
    pub fn client(&self) -> &R2Client {
        self.client.get_or_init(|| self.credentials.client())
    }

    /// Resolves this handle's bucket on its client.
    #[must_use]
    pub fn bucket(&self) -> BucketRef {
        self.client().resolve_bucket(self.name.as_str())
    }

    /// Uploads `local_path` to `remote_path`. See [`BucketRef::upload`].
    ///
    /// # Errors
    ///
    /// See [`BucketRef::upload`].
    pub async fn upload(
        &self,
        local_path: impl AsRef<Path>,
        remote_path: &str,
        options: &UploadOptions,
    ) -> Result<TransferResult, R2Error> {
        self.bucket().upload(local_path, remote_path, options).await
    }

    /// Downloads `remote_path` to `local_path`. See [`BucketRef::download`].
    ///
    /// # Errors
    ///
    /// See [`BucketRef::download`].
    pub async fn download(
        &self,
        remote_path: &str,
        local_path: impl AsRef<Path>,
    ) -> Result<TransferResult, R2Error> {
        self.bucket().download(remote_path, local_path).await
    }
}

/// Temporary sibling of `path` for an in-flight download. The random
/// component keeps it clear of user files and of concurrent downloads to
/// the same target.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}.part", uuid::Uuid::new_v4().simple()));
    PathBuf::from(name)
}

fn format_size(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)] // display-only MB value
    let mb = bytes as f64 / 1_048_576.0;
    format!("{mb:.1} MB")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryTransport;

    struct Scratch(PathBuf);

    impl Scratch {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("start_sdk_r2_{}", uuid::Uuid::new_v4()));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn path(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }

        fn entries(&self) -> Vec<String> {
            let mut names: Vec<String> = std::fs::read_dir(&self.0)
                .unwrap()
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn memory_bucket(name: &str) -> (R2Bucket, Arc<MemoryTransport>) {
        let store = Arc::new(MemoryTransport::new());
        let client = R2Client::with_transport(Arc::clone(&store) as Arc<dyn ObjectTransport>);
        let bucket = R2Bucket::new(R2Credentials::default(), name)
            .unwrap()
            .with_client(client);
        (bucket, store)
    }

    #[tokio::test]
    async fn upload_then_download_round_trips_bytes() {
        let scratch = Scratch::new();
        let (bucket, _store) = memory_bucket("data");

        let contents: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let source = scratch.path("source.bin");
        std::fs::write(&source, &contents).unwrap();

        let uploaded = bucket
            .upload(&source, "dir/object.bin", &UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(uploaded.bucket, "data");
        assert_eq!(uploaded.key, "dir/object.bin");
        assert_eq!(uploaded.bytes, 10_000);

        let target = scratch.path("target.bin");
        let downloaded = bucket.download("dir/object.bin", &target).await.unwrap();
        assert_eq!(downloaded.bytes, 10_000);
        assert_eq!(downloaded.e_tag, uploaded.e_tag);
        assert_eq!(std::fs::read(&target).unwrap(), contents);
        assert_eq!(scratch.entries(), ["source.bin", "target.bin"]);
    }

    #[tokio::test]
    async fn upload_of_missing_file_never_reaches_the_store() {
        let scratch = Scratch::new();
        let (bucket, store) = memory_bucket("data");

        let err = bucket
            .upload(scratch.path("nope.bin"), "nope.bin", &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, R2Error::LocalFileNotFound { .. }), "got {err:?}");
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn download_of_missing_key_leaves_no_file() {
        let scratch = Scratch::new();
        let (bucket, store) = memory_bucket("data");

        let target = scratch.path("missing.bin");
        let err = bucket.download("missing.bin", &target).await.unwrap_err();

        assert!(matches!(err, R2Error::NotFound { .. }), "got {err:?}");
        assert_eq!(store.get_count(), 1);
        assert!(!target.exists());
        assert!(scratch.entries().is_empty());
    }

    #[tokio::test]
    async fn failed_download_keeps_existing_local_file() {
        let scratch = Scratch::new();
        let (bucket, _store) = memory_bucket("data");

        let target = scratch.path("keep.txt");
        std::fs::write(&target, "previous").unwrap();

        assert!(bucket.download("absent.txt", &target).await.is_err());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "previous");
    }

    #[tokio::test]
    async fn download_overwrites_existing_local_file() {
        let scratch = Scratch::new();
        let (bucket, store) = memory_bucket("data");
        store.insert("data", "fresh.txt", "new contents");

        let target = scratch.path("fresh.txt");
        std::fs::write(&target, "old contents that are longer").unwrap();

        bucket.download("fresh.txt", &target).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new contents");
    }

    #[tokio::test]
    async fn upload_options_reach_the_store_unchanged() {
        let scratch = Scratch::new();
        let (bucket, store) = memory_bucket("site");

        let source = scratch.path("index.html");
        std::fs::write(&source, "<html></html>").unwrap();

        let options = UploadOptions {
            cache_control: Some("max-age=60".to_string()),
            storage_class: Some("STANDARD_IA".to_string()),
            ..UploadOptions::default()
        }
        .with_content_type("text/html")
        .with_metadata("build", "1234");

        bucket.upload(&source, "index.html", &options).await.unwrap();

        let stored = store.object("site", "index.html").unwrap();
        assert_eq!(stored.options, options);
        assert_eq!(stored.body, b"<html></html>");
    }

    #[tokio::test]
    async fn handles_for_different_buckets_do_not_share_objects() {
        let scratch = Scratch::new();
        let store = Arc::new(MemoryTransport::new());
        let client = R2Client::with_transport(Arc::clone(&store) as Arc<dyn ObjectTransport>);

        let source = scratch.path("a.txt");
        std::fs::write(&source, "a").unwrap();

        client
            .resolve_bucket("first")
            .upload(&source, "a.txt", &UploadOptions::default())
            .await
            .unwrap();

        let err = client
            .resolve_bucket("second")
            .download("a.txt", scratch.path("b.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn rejects_empty_bucket_name() {
        let err = R2Bucket::new(R2Credentials::default(), "").unwrap_err();
        assert!(matches!(
            err,
            R2Error::InvalidConfig {
                field: "bucket name",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn failed_download_keeps_user_file_named_like_a_partial() {
        let scratch = Scratch::new();
        let (bucket, _store) = memory_bucket("data");

        let target = scratch.path("report.csv");
        let neighbour = scratch.path("report.csv.part");
        std::fs::write(&neighbour, "user data").unwrap();

        assert!(bucket.download("absent.csv", &target).await.is_err());
        assert_eq!(std::fs::read_to_string(&neighbour).unwrap(), "user data");
        assert_eq!(scratch.entries(), ["report.csv.part"]);
    }

    #[tokio::test]
    async fn successful_download_keeps_user_file_named_like_a_partial() {
        let scratch = Scratch::new();
        let (bucket, store) = memory_bucket("data");
        store.insert("data", "report.csv", "a,b");

        let target = scratch.path("report.csv");
        let neighbour = scratch.path("report.csv.part");
        std::fs::write(&neighbour, "user data").unwrap();

        bucket.download("report.csv", &target).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "a,b");
        assert_eq!(std::fs::read_to_string(&neighbour).unwrap(), "user data");
    }

    #[test]
    fn partial_path_is_a_unique_sibling() {
        let target = Path::new("/tmp/out/file.tar.gz");
        let first = partial_path(target);
        let second = partial_path(target);

        assert_ne!(first, second);
        assert_eq!(first.parent(), target.parent());
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("file.tar.gz."), "{name}");
        assert!(name.ends_with(".part"), "{name}");
        assert_ne!(name, "file.tar.gz.part");
    }

    #[tokio::test]
    async fn bucket_handle_exposes_endpoint_and_name() {
        let bucket = R2Bucket::new(R2Credentials::default(), "test").unwrap();
        assert_eq!(bucket.name(), "test");
        assert_eq!(bucket.bucket().name(), "test");
        assert_eq!(bucket.endpoint_url(), "https://ACT.r2.cloudflarestorage.com");
    }
}
