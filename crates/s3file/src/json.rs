// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON parser: one metric per top-level object.
//!
//! Numbers and booleans become fields, nested objects and arrays are flattened with `_`
//! separated keys, and string values are kept as tags only when their flattened key is listed
//! in `tag_keys`. Objects that end up without any field are dropped.

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ParseError;
use crate::metric::{FieldValue, Metric};
use crate::parser::Parser;

#[derive(Clone, Debug)]
pub struct JsonParser {
    metric_name: String,
    tag_keys: Vec<String>,
}

impl JsonParser {
    pub fn new(metric_name: String, tag_keys: Vec<String>) -> Self {
        Self {
            metric_name,
            tag_keys,
        }
    }

    fn parse_object(&self, object: &Map<String, Value>) -> Option<Metric> {
        let mut metric = Metric::new(self.metric_name.as_str());
        self.flatten(
            &mut metric,
            "",
            &mut object.iter().map(|(k, v)| (k.clone(), v)),
        );
        if metric.fields().is_empty() {
            debug!("Dropping JSON object without numeric or boolean values");
            return None;
        }
        Some(metric)
    }

    fn flatten<'a>(
        &self,
        metric: &mut Metric,
        prefix: &str,
        entries: &mut dyn Iterator<Item = (String, &'a Value)>,
    ) {
        for (key, value) in entries {
            let key = if prefix.is_empty() {
                key
            } else {
                format!("{prefix}_{key}")
            };
            match value {
                Value::Number(n) => {
                    if let Some(float) = n.as_f64() {
                        metric.add_field(key, FieldValue::Float(float));
                    }
                }
                Value::Bool(b) => metric.add_field(key, FieldValue::Boolean(*b)),
                Value::String(s) => {
                    if self.tag_keys.contains(&key) {
                        metric.add_tag(key, s.as_str());
                    }
                }
                Value::Object(nested) => {
                    self.flatten(metric, &key, &mut nested.iter().map(|(k, v)| (k.clone(), v)));
                }
                Value::Array(items) => {
                    self.flatten(
                        metric,
                        &key,
                        &mut items.iter().enumerate().map(|(i, v)| (i.to_string(), v)),
                    );
                }
                Value::Null => {}
            }
        }
    }
}

impl Parser for JsonParser {
    fn parse(&self, buf: &[u8]) -> Result<Vec<Metric>, ParseError> {
        if buf.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        match serde_json::from_slice::<Value>(buf)? {
            Value::Object(object) => Ok(self.parse_object(&object).into_iter().collect()),
            Value::Array(items) => {
                let mut metrics = Vec::with_capacity(items.len());
                for item in &items {
                    match item {
                        Value::Object(object) => metrics.extend(self.parse_object(object)),
                        other => return Err(ParseError::JsonShape(kind(other))),
                    }
                }
                Ok(metrics)
            }
            other => Err(ParseError::JsonShape(kind(&other))),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
