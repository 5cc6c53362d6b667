#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Plain data types shared by the R2 client and its command-line front end.
//!
//! Nothing in here touches the network or the filesystem: these are the
//! per-upload options forwarded to `PutObject`, the result of a completed
//! transfer, and the names/defaults of the settings the credentials loader
//! reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Host suffix of the R2 S3-compatible API. The account id is prepended as
/// the first DNS label.
pub const ENDPOINT_DOMAIN: &str = "r2.cloudflarestorage.com";

/// Default settings file consulted by the credentials loader.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Environment variable holding the Cloudflare account id.
pub const ACCOUNT_ID_VAR: &str = "CF_R2_ACCT_ID";
/// Environment variable holding the R2 location hint.
pub const REGION_VAR: &str = "CF_R2_REGION";
/// Environment variable holding the R2 token's access key id.
pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable holding the R2 token's secret access key.
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";

/// Fallback account id when nothing else is configured.
pub const DEFAULT_ACCOUNT_ID: &str = "ACT";
/// Fallback location hint. See
/// <https://developers.cloudflare.com/r2/reference/data-location/#available-hints>.
pub const DEFAULT_REGION: &str = "apac";
/// Fallback access key id.
pub const DEFAULT_ACCESS_KEY_ID: &str = "ABC";
/// Fallback secret access key.
pub const DEFAULT_SECRET_ACCESS_KEY: &str = "XYZ";

/// Provider-specific parameters attached to a single upload.
///
/// Every field is forwarded to `PutObject` as-is. Values are not checked
/// here; an unsupported storage class or a malformed header value is
/// rejected by R2 when the request is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadOptions {
    /// `Content-Type` stored with the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// `Cache-Control` stored with the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// `Content-Disposition` stored with the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    /// `Content-Encoding` stored with the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// `Content-Language` stored with the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    /// Storage class (`STANDARD` or `STANDARD_IA` on R2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    /// User metadata, sent as `x-amz-meta-*` headers.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl UploadOptions {
    /// Returns `true` if no option is set, i.e. the upload is a bare
    /// `PutObject` with only bucket, key and body.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Sets the `Content-Type`.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Adds one user metadata entry, replacing any previous value for `key`.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Outcome of one completed upload or download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    /// Bucket the object lives in.
    pub bucket: String,
    /// Object key inside the bucket.
    pub key: String,
    /// Number of bytes moved.
    pub bytes: u64,
    /// `ETag` reported by the provider, quotes included, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
}

impl std::fmt::Display for TransferResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{} ({} bytes)", self.bucket, self.key, self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_empty() {
        assert!(UploadOptions::default().is_empty());
        assert!(!UploadOptions::default().with_content_type("text/csv").is_empty());
    }

    #[test]
    fn with_metadata_replaces_existing_key() {
        let options = UploadOptions::default()
            .with_metadata("source", "a")
            .with_metadata("source", "b");
        assert_eq!(options.metadata.len(), 1);
        assert_eq!(options.metadata["source"], "b");
    }

    #[test]
    fn options_omit_unset_fields_when_serialized() {
        let options = UploadOptions::default().with_content_type("application/json");
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(json, r#"{"contentType":"application/json"}"#);
    }

    #[test]
    fn options_deserialize_from_partial_json() {
        let options: UploadOptions =
            serde_json::from_str(r#"{"cacheControl":"no-cache","metadata":{"k":"v"}}"#).unwrap();
        assert_eq!(options.cache_control.as_deref(), Some("no-cache"));
        assert_eq!(options.metadata["k"], "v");
        assert!(options.content_type.is_none());
    }

    #[test]
    fn transfer_result_displays_as_s3_uri() {
        let result = TransferResult {
            bucket: "reports".to_string(),
            key: "2024/q1.pdf".to_string(),
            bytes: 42,
            e_tag: None,
        };
        assert_eq!(result.to_string(), "s3://reports/2024/q1.pdf (42 bytes)");
    }
}
