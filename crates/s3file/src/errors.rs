// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the s3file collector.

/// Errors detected while setting up the collector or binding the storage client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing region: expecting an S3 region to connect to")]
    MissingRegion,

    #[error("missing bucket: expecting an S3 bucket to read from")]
    MissingBucket,

    #[error("unknown character encoding {0:?}")]
    UnknownEncoding(String),

    #[error("unknown data format {0:?}")]
    UnknownDataFormat(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned by the object storage service.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object s3://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("failed to get object s3://{bucket}/{key}: {message}")]
    GetObject {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Errors produced by format parsers.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: {reason}")]
    LineProtocol { line: usize, reason: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object or an array of objects, got {0}")]
    JsonShape(&'static str),

    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Errors that abort a gather cycle.
#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("object {key} could not be read: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}
