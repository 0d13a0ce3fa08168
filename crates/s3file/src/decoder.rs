// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Character decoding of object bodies.
//!
//! A [`Decoder`] is built once from the configured `character_encoding`. An empty identifier
//! (or `none`) passes bytes through untouched; otherwise only `utf-8` (or `utf8`), `utf-16le`
//! and `utf-16be` are accepted. Leading byte-order marks are always removed, and malformed input
//! is replaced with U+FFFD instead of failing.

use std::io;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use tracing::debug;

use crate::errors::ConfigError;
use crate::object::ObjectBody;

const BOM_CHAR: char = '\u{FEFF}';

// Longest prefixes first: the UTF-32LE mark starts with the UTF-16LE one.
const BYTE_ORDER_MARKS: [&[u8]; 5] = [
    &[0x00, 0x00, 0xFE, 0xFF],
    &[0xFF, 0xFE, 0x00, 0x00],
    &[0xEF, 0xBB, 0xBF],
    &[0xFE, 0xFF],
    &[0xFF, 0xFE],
];

/// Decodes raw object bytes into canonical UTF-8 text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoder {
    encoding: Option<&'static Encoding>,
}

impl Decoder {
    /// Builds a decoder for `character_encoding`.
    ///
    /// Fails with [`ConfigError::UnknownEncoding`] for identifiers that name no known encoding.
    pub fn new(character_encoding: &str) -> Result<Self, ConfigError> {
        let label = character_encoding.trim();
        if label.is_empty() || label.eq_ignore_ascii_case("none") {
            return Ok(Self { encoding: None });
        }

        let encoding = match label.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => UTF_8,
            "utf-16le" => UTF_16LE,
            "utf-16be" => UTF_16BE,
            _ => return Err(ConfigError::UnknownEncoding(character_encoding.to_string())),
        };
        debug!("Decoding objects as {}", encoding.name());
        Ok(Self {
            encoding: Some(encoding),
        })
    }

    /// Name of the configured encoding, `none` for pass-through.
    pub fn encoding_name(&self) -> &'static str {
        self.encoding.map_or("none", Encoding::name)
    }

    /// Drains `body` and decodes it. The body is released before this returns.
    pub async fn read(&self, mut body: ObjectBody) -> io::Result<Vec<u8>> {
        let raw = body.read_to_end().await?;
        drop(body);
        Ok(self.decode(&raw))
    }

    pub fn decode(&self, raw: &[u8]) -> Vec<u8> {
        match self.encoding {
            None => strip_byte_order_mark(raw).to_vec(),
            Some(encoding) => {
                let (text, had_errors) = encoding.decode_with_bom_removal(raw);
                if had_errors {
                    debug!(
                        "Replaced malformed {} sequences with U+FFFD",
                        encoding.name()
                    );
                }
                text.strip_prefix(BOM_CHAR)
                    .unwrap_or(text.as_ref())
                    .as_bytes()
                    .to_vec()
            }
        }
    }
}

fn strip_byte_order_mark(raw: &[u8]) -> &[u8] {
    BYTE_ORDER_MARKS
        .iter()
        .find_map(|bom| raw.strip_prefix(*bom))
        .unwrap_or(raw)
}
