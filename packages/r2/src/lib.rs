#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cloudflare R2 access through the S3-compatible API.
//!
//! Two layers:
//!
//! - [`R2Credentials`] holds the account id, location hint and API token
//!   pair, derives the endpoint URL, and builds an [`R2Client`].
//! - [`R2Bucket`] pairs credentials with a bucket name and exposes
//!   [`R2Bucket::upload`] and [`R2Bucket::download`].
//!
//! Transfers go through the [`ObjectTransport`] trait. [`S3Transport`] talks
//! to R2 with `aws-sdk-s3`; [`MemoryTransport`] keeps objects in process.
//!
//! # Settings
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `CF_R2_ACCT_ID` | `ACT` | Cloudflare account ID (builds the R2 endpoint) |
//! | `CF_R2_REGION` | `apac` | R2 location hint |
//! | `AWS_ACCESS_KEY_ID` | `ABC` | Access key of the R2 API token |
//! | `AWS_SECRET_ACCESS_KEY` | `XYZ` | Secret of the R2 API token |
//!
//! Values set in the process environment win over values in a `.env` file
//! in the working directory; see [`CredentialsLoader`] for explicit
//! overrides and a custom settings file.
//!
//! No retries are attempted. A failed transfer is returned to the caller as
//! an [`R2Error`] with the SDK error as its source.

use std::path::PathBuf;

mod bucket;
mod client;
pub mod credentials;
pub mod transport;

pub use bucket::{BucketRef, R2Bucket};
pub use client::R2Client;
pub use credentials::{CredentialsLoader, R2Credentials};
pub use start_sdk_r2_models as models;
pub use start_sdk_r2_models::{TransferResult, UploadOptions};
pub use transport::{MemoryTransport, ObjectReceipt, ObjectTransport, S3Transport, StoredObject};

/// Errors that can occur during R2 operations.
#[derive(Debug, thiserror::Error)]
pub enum R2Error {
    /// A credential or bucket setting failed validation.
    #[error("Invalid {field}: {reason}")]
    InvalidConfig {
        /// Name of the offending setting.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The settings file exists but could not be read or parsed.
    #[error("Failed to read settings file {}: {source}", .path.display())]
    EnvFile {
        /// Settings file path.
        path: PathBuf,
        /// Underlying parse or I/O error.
        source: dotenvy::Error,
    },

    /// The local file to upload does not exist.
    #[error("Local file not found: {}", .path.display())]
    LocalFileNotFound {
        /// Path that was opened.
        path: PathBuf,
    },

    /// I/O error reading or writing a local file.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Local path involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The requested object does not exist in the bucket.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },

    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// S3 `GetObject` failed.
    #[error("Failed to download s3://{bucket}/{key}: {source}")]
    Download {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl R2Error {
    /// Returns `true` for a missing remote object or a missing local
    /// upload source.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::LocalFileNotFound { .. })
    }

    pub(crate) fn upload(
        bucket: &str,
        key: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn download(
        bucket: &str,
        key: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_covers_local_and_remote() {
        assert!(R2Error::not_found("b", "k").is_not_found());
        assert!(
            R2Error::LocalFileNotFound {
                path: PathBuf::from("missing.bin"),
            }
            .is_not_found()
        );
        assert!(!R2Error::upload("b", "k", "denied").is_not_found());
    }

    #[test]
    fn transfer_errors_keep_their_source() {
        use std::error::Error as _;

        let err = R2Error::download("reports", "q1.pdf", "connection reset");
        assert_eq!(
            err.to_string(),
            "Failed to download s3://reports/q1.pdf: connection reset"
        );
        assert_eq!(err.source().unwrap().to_string(), "connection reset");
    }
}
