// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod accumulator_service;
pub mod client;
pub mod config;
pub mod decoder;
pub mod errors;
pub mod json;
pub mod line_protocol;
pub mod metric;
pub mod object;
pub mod parser;
pub mod s3file;
