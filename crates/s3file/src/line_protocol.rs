// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! InfluxDB line protocol parser.
//!
//! `measurement[,tag=value...] field=value[,field=value...] [timestamp]`
//!
//! Empty lines and lines starting with `#` are skipped. Commas, spaces and equal signs in
//! measurement names, tag keys, tag values and field keys may be escaped with a backslash.

use crate::errors::ParseError;
use crate::metric::{FieldValue, Metric};
use crate::parser::Parser;

#[derive(Clone, Copy, Debug, Default)]
pub struct LineProtocolParser;

impl Parser for LineProtocolParser {
    fn parse(&self, buf: &[u8]) -> Result<Vec<Metric>, ParseError> {
        let text = std::str::from_utf8(buf)?;
        let mut metrics = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let metric = parse_line(line).map_err(|reason| ParseError::LineProtocol {
                line: index + 1,
                reason,
            })?;
            metrics.push(metric);
        }
        Ok(metrics)
    }
}

fn parse_line(line: &str) -> Result<Metric, String> {
    let series_end = find_unescaped(line, ' ', false).ok_or("missing fields")?;
    let series = &line[..series_end];
    let rest = line[series_end + 1..].trim_start_matches(' ');

    let fields_end = find_unescaped(rest, ' ', true).unwrap_or(rest.len());
    let fields = &rest[..fields_end];
    let timestamp = rest[fields_end..].trim();

    let mut parts = split_unescaped(series, ',', false).into_iter();
    let name = parts
        .next()
        .map(|n| unescape(n, &[',', ' ']))
        .filter(|n| !n.is_empty())
        .ok_or("missing measurement")?;
    let mut metric = Metric::new(name);

    for tag in parts {
        let (key, value) = split_pair(tag, false).ok_or_else(|| format!("invalid tag {tag:?}"))?;
        if key.is_empty() || value.is_empty() {
            return Err(format!("invalid tag {tag:?}"));
        }
        metric.add_tag(
            unescape(key, &[',', ' ', '=']),
            unescape(value, &[',', ' ', '=']),
        );
    }

    if fields.is_empty() {
        return Err("missing fields".to_string());
    }
    for field in split_unescaped(fields, ',', true) {
        let (key, value) =
            split_pair(field, true).ok_or_else(|| format!("invalid field {field:?}"))?;
        if key.is_empty() {
            return Err(format!("invalid field {field:?}"));
        }
        metric.add_field(unescape(key, &[',', ' ', '=']), parse_field_value(value)?);
    }

    if !timestamp.is_empty() {
        let ts = timestamp
            .parse::<i64>()
            .map_err(|e| format!("invalid timestamp {timestamp:?}: {e}"))?;
        metric.timestamp = Some(ts);
    }

    Ok(metric)
}

fn parse_field_value(value: &str) -> Result<FieldValue, String> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        return Ok(FieldValue::String(unescape(inner, &['"', '\\'])));
    }
    match value {
        "" => return Err("missing field value".to_string()),
        "t" | "T" | "true" | "True" | "TRUE" => return Ok(FieldValue::Boolean(true)),
        "f" | "F" | "false" | "False" | "FALSE" => return Ok(FieldValue::Boolean(false)),
        _ => {}
    }
    if let Some(int) = value.strip_suffix('i') {
        return int
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|e| format!("invalid integer {value:?}: {e}"));
    }
    if let Some(uint) = value.strip_suffix('u') {
        return uint
            .parse::<u64>()
            .map(FieldValue::Unsigned)
            .map_err(|e| format!("invalid unsigned {value:?}: {e}"));
    }
    match value.parse::<f64>() {
        Ok(float) if float.is_finite() => Ok(FieldValue::Float(float)),
        _ => Err(format!("invalid field value {value:?}")),
    }
}

/// Byte offset of the first `delim` not preceded by a backslash (nor inside a quoted string,
/// when `quotes` is set).
fn find_unescaped(s: &str, delim: char, quotes: bool) -> Option<usize> {
    let mut escaped = false;
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if quotes && c == '"' {
            in_quotes = !in_quotes;
        } else if c == delim && !in_quotes {
            return Some(i);
        }
    }
    None
}

fn split_unescaped(s: &str, delim: char, quotes: bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(i) = find_unescaped(rest, delim, quotes) {
        parts.push(&rest[..i]);
        rest = &rest[i + delim.len_utf8()..];
    }
    parts.push(rest);
    parts
}

fn split_pair(s: &str, quotes: bool) -> Option<(&str, &str)> {
    let i = find_unescaped(s, '=', quotes)?;
    Some((&s[..i], &s[i + 1..]))
}

fn unescape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if special.contains(&next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Vec<Metric>, ParseError> {
        LineProtocolParser.parse(input.as_bytes())
    }

    #[test]
    fn test_parse_full_line() {
        let metrics = parse("cpu,host=a,region=eu usage=0.5,count=3i,up=t,name=\"x y\" 1656581409")
            .expect("parse failed");
        assert_eq!(metrics.len(), 1);
        let metric = &metrics[0];
        assert_eq!(metric.name, "cpu");
        assert_eq!(metric.tag("host"), Some("a"));
        assert_eq!(metric.tag("region"), Some("eu"));
        assert_eq!(metric.field("usage"), Some(&FieldValue::Float(0.5)));
        assert_eq!(metric.field("count"), Some(&FieldValue::Integer(3)));
        assert_eq!(metric.field("up"), Some(&FieldValue::Boolean(true)));
        assert_eq!(
            metric.field("name"),
            Some(&FieldValue::String("x y".to_string()))
        );
        assert_eq!(metric.timestamp, Some(1_656_581_409));
    }

    #[test]
    fn test_parse_multiple_lines_skips_blank_and_comments() {
        let metrics = parse("# header\r\ncpu value=1\r\n\r\nmem free=2u\n").expect("parse failed");
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].name, "cpu");
        assert_eq!(metrics[1].field("free"), Some(&FieldValue::Unsigned(2)));
    }

    #[test]
    fn test_parse_escapes() {
        let metrics = parse(r#"my\ metric,tag\=key=a\,b field\ one="say \"hi\"""#)
            .expect("parse failed");
        let metric = &metrics[0];
        assert_eq!(metric.name, "my metric");
        assert_eq!(metric.tag("tag=key"), Some("a,b"));
        assert_eq!(
            metric.field("field one"),
            Some(&FieldValue::String("say \"hi\"".to_string()))
        );
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse("cpu value=1\ncpu\n").expect_err("should fail");
        match err {
            ParseError::LineProtocol { line, reason } => {
                assert_eq!(line, 2);
                assert_eq!(reason, "missing fields");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_values() {
        assert!(parse("cpu value=abc").is_err());
        assert!(parse("cpu value=1.5i").is_err());
        assert!(parse("cpu value=").is_err());
        assert!(parse("cpu value=1 notatime").is_err());
        assert!(parse("cpu,host value=1").is_err());
        assert!(parse(",host=a value=1").is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        assert!(matches!(
            LineProtocolParser.parse(&[0x63, 0xFF, 0x20]),
            Err(ParseError::Utf8(_))
        ));
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").expect("parse failed").is_empty());
    }

    #[test]
    fn test_display_round_trip() {
        let line = "disk,path=/var used=42i,free=1.5 1656581409000000000";
        let metric = parse(line).expect("parse failed").remove(0);
        assert_eq!(parse(&metric.to_string()).expect("reparse").remove(0), metric);
    }
}
