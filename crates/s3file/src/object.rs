// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Whole-object retrieval from the object storage service.
//!
//! An [`ObjectStore`] returns the body of a single object as an [`ObjectBody`]. The body owns
//! the underlying connection and releases it when dropped, so every exit path of the code that
//! consumes it (success, decode failure, parse failure, cancelled cycle) gives it back.

use std::fmt::Debug;
use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::errors::StorageError;

/// Body of a fetched object.
pub struct ObjectBody {
    key: String,
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl ObjectBody {
    pub fn new(key: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            key: key.into(),
            reader: Box::pin(reader),
        }
    }

    /// Creates a body backed by an in-memory buffer.
    pub fn from_bytes(key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(key, io::Cursor::new(bytes.into()))
    }

    /// Key of the object this body was read from.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Drains the remaining bytes of the body.
    pub async fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl Drop for ObjectBody {
    fn drop(&mut self) {
        trace!("Released body of object {}", self.key);
    }
}

impl Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody").field("key", &self.key).finish()
    }
}

/// Read access to a bucket/key addressed blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Retrieves the whole body of `bucket`/`key`. Failures are returned as-is, without retry.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StorageError>;
}

/// [`ObjectStore`] backed by the AWS S3 API.
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StorageError> {
        debug!("Getting object s3://{bucket}/{key}");
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if is_not_found_error(&e) {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::GetObject {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        message: format!("S3 GetObject failed: {e}"),
                    }
                }
            })?;

        Ok(ObjectBody::new(key, response.body.into_async_read()))
    }
}

fn is_not_found_error<R>(err: &SdkError<GetObjectError, R>) -> bool {
    match err {
        SdkError::ServiceError(service_err) => service_err.err().is_no_such_key(),
        _ => false,
    }
}
