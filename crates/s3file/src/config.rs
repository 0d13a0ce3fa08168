// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::Path;

use serde::Deserialize;

use crate::client::ClientSettings;
use crate::errors::ConfigError;
use crate::parser::{ParserConfig, DEFAULT_DATA_FORMAT, DEFAULT_METRIC_NAME};

/// Configuration of one s3file collector.
///
/// Field names follow the collector's documented options (`bucket`, `keys`, `region`,
/// `key_tag`, `character_encoding`, `data_format`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct S3FileConfig {
    /// Bucket the objects are read from
    pub bucket: String,
    /// Object keys, read in this order on every gather cycle
    pub keys: Vec<String>,
    /// AWS region of the bucket
    pub region: String,
    /// Name of the tag holding the base name of the source key, empty to disable
    pub key_tag: String,
    /// Encoding of the object contents, empty to pass bytes through
    pub character_encoding: String,
    /// Input format, see [`crate::parser::build`]
    pub data_format: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
    /// Path-style addressing, required by MinIO and LocalStack
    pub force_path_style: bool,
    /// Measurement name for formats that don't carry one
    pub metric_name: String,
    /// JSON string values kept as tags
    pub json_tag_keys: Vec<String>,
}

impl Default for S3FileConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            keys: Vec::new(),
            region: String::new(),
            key_tag: String::new(),
            character_encoding: String::new(),
            data_format: DEFAULT_DATA_FORMAT.to_string(),
            endpoint_url: None,
            force_path_style: false,
            metric_name: DEFAULT_METRIC_NAME.to_string(),
            json_tag_keys: Vec::new(),
        }
    }
}

impl S3FileConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            bucket: env::var("S3FILE_BUCKET").unwrap_or_default(),
            keys: env::var("S3FILE_KEYS")
                .map(|val| parse_list(&val))
                .unwrap_or_default(),
            region: env::var("S3FILE_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_default(),
            key_tag: env::var("S3FILE_KEY_TAG").unwrap_or_default(),
            character_encoding: env::var("S3FILE_CHARACTER_ENCODING").unwrap_or_default(),
            data_format: env::var("S3FILE_DATA_FORMAT").unwrap_or(defaults.data_format),
            endpoint_url: env::var("S3FILE_ENDPOINT_URL")
                .ok()
                .filter(|val| !val.trim().is_empty()),
            force_path_style: env::var("S3FILE_FORCE_PATH_STYLE")
                .map(|val| val.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            metric_name: env::var("S3FILE_METRIC_NAME").unwrap_or(defaults.metric_name),
            json_tag_keys: env::var("S3FILE_JSON_TAG_KEYS")
                .map(|val| parse_list(&val))
                .unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read(path).map_err(|e| {
            ConfigError::Invalid(format!("could not read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_slice(&contents).map_err(|e| {
            ConfigError::Invalid(format!("could not parse {}: {e}", path.display()))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// The region is checked later, when the storage client is first bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::MissingBucket);
        }

        if self.keys.iter().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid("keys cannot be empty".to_string()));
        }

        if self.metric_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "metric_name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
        }
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            data_format: self.data_format.clone(),
            metric_name: self.metric_name.clone(),
            json_tag_keys: self.json_tag_keys.clone(),
        }
    }
}

fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}
