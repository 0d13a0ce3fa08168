// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Format parsers turning decoded object contents into metrics.

use crate::errors::{ConfigError, ParseError};
use crate::json::JsonParser;
use crate::line_protocol::LineProtocolParser;
use crate::metric::Metric;

pub const DEFAULT_DATA_FORMAT: &str = "influx";
pub const DEFAULT_METRIC_NAME: &str = "s3file";

/// Converts the decoded contents of one object into metrics.
pub trait Parser: Send + Sync {
    fn parse(&self, buf: &[u8]) -> Result<Vec<Metric>, ParseError>;
}

/// Settings used to select and build a [`Parser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Input format, `influx` or `json`.
    pub data_format: String,
    /// Measurement name for formats that don't carry one.
    pub metric_name: String,
    /// JSON string values to keep as tags.
    pub json_tag_keys: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            data_format: DEFAULT_DATA_FORMAT.to_string(),
            metric_name: DEFAULT_METRIC_NAME.to_string(),
            json_tag_keys: Vec::new(),
        }
    }
}

/// Builds the parser named by `config.data_format`.
pub fn build(config: &ParserConfig) -> Result<Box<dyn Parser>, ConfigError> {
    match config.data_format.trim().to_lowercase().as_str() {
        "influx" => Ok(Box::new(LineProtocolParser)),
        "json" => Ok(Box::new(JsonParser::new(
            config.metric_name.clone(),
            config.json_tag_keys.clone(),
        ))),
        _ => Err(ConfigError::UnknownDataFormat(config.data_format.clone())),
    }
}
