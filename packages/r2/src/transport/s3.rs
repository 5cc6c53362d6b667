use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::StorageClass;
use start_sdk_r2_models::UploadOptions;
use tokio::fs::File;

use super::{ObjectReceipt, ObjectTransport};
use crate::{R2Credentials, R2Error};

/// [`ObjectTransport`] backed by `aws-sdk-s3` against the R2 endpoint.
#[derive(Debug, Clone)]
pub struct S3Transport {
    client: aws_sdk_s3::Client,
}

impl S3Transport {
    /// Creates a transport for the account in `credentials`.
    #[must_use]
    pub fn new(credentials: &R2Credentials) -> Self {
        Self::from_client(crate::client::build_s3_client(credentials))
    }

    /// Wraps an already configured SDK client.
    #[must_use]
    pub const fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectTransport for S3Transport {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: File,
        options: &UploadOptions,
    ) -> Result<ObjectReceipt, R2Error> {
        let bytes = body
            .metadata()
            .await
            .map_err(|e| R2Error::upload(bucket, key, e))?
            .len();

        let body = ByteStream::read_from()
            .file(body)
            .build()
            .await
            .map_err(|e| R2Error::upload(bucket, key, e))?;

        let metadata = (!options.metadata.is_empty()).then(|| {
            options
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<HashMap<_, _>>()
        });

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .set_content_type(options.content_type.clone())
            .set_cache_control(options.cache_control.clone())
            .set_content_disposition(options.content_disposition.clone())
            .set_content_encoding(options.content_encoding.clone())
            .set_content_language(options.content_language.clone())
            .set_storage_class(options.storage_class.as_deref().map(StorageClass::from))
            .set_metadata(metadata)
            .send()
            .await
            .map_err(|e| R2Error::upload(bucket, key, e))?;

        Ok(ObjectReceipt {
            bytes,
            e_tag: output.e_tag().map(str::to_string),
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut File,
    ) -> Result<ObjectReceipt, R2Error> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    R2Error::not_found(bucket, key)
                } else {
                    R2Error::download(bucket, key, err)
                }
            })?;

        let e_tag = output.e_tag().map(str::to_string);
        let mut reader = output.body.into_async_read();
        let bytes = tokio::io::copy(&mut reader, sink)
            .await
            .map_err(|e| R2Error::download(bucket, key, e))?;

        Ok(ObjectReceipt { bytes, e_tag })
    }
}
