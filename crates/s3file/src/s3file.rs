// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Gather cycle of the s3file collector.
//!
//! Every call to [`S3File::gather`] binds the storage client if needed, then for each
//! configured key, in order: fetches the object, decodes it, parses it, tags the resulting
//! metrics with the base name of the key and forwards them to the accumulator before moving to
//! the next key. The first error aborts the cycle; metrics already forwarded stay forwarded.
//!
//! Gather cycles of one instance must not overlap. `gather` takes `&mut self` to enforce it.

use std::sync::Arc;

use tracing::debug;

use crate::accumulator_service::Accumulator;
use crate::client::{ClientBinding, ClientFactory, S3ClientFactory};
use crate::config::S3FileConfig;
use crate::decoder::Decoder;
use crate::errors::{ConfigError, GatherError};
use crate::metric::Metric;
use crate::object::ObjectStore;
use crate::parser::{self, Parser};

/// Collector reading whole objects from one bucket every gather cycle.
pub struct S3File {
    config: S3FileConfig,
    decoder: Decoder,
    parser: Box<dyn Parser>,
    binding: ClientBinding,
}

impl S3File {
    /// Creates a collector using the parser selected by `config.data_format`.
    pub fn from_config(config: S3FileConfig) -> Result<Self, ConfigError> {
        let parser = parser::build(&config.parser_config())?;
        Self::new(config, parser)
    }

    /// Creates a collector talking to AWS S3.
    ///
    /// Fails if the configuration is invalid or names an unknown character encoding. The
    /// region is only checked when the client is first bound.
    pub fn new(config: S3FileConfig, parser: Box<dyn Parser>) -> Result<Self, ConfigError> {
        Self::with_client_factory(config, parser, Arc::new(S3ClientFactory))
    }

    pub fn with_client_factory(
        config: S3FileConfig,
        parser: Box<dyn Parser>,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let decoder = Decoder::new(&config.character_encoding)?;
        debug!(
            "s3file configured for s3://{} with {} keys, encoding {}",
            config.bucket,
            config.keys.len(),
            decoder.encoding_name()
        );
        Ok(Self {
            config,
            decoder,
            parser,
            binding: ClientBinding::new(factory),
        })
    }

    pub fn config(&self) -> &S3FileConfig {
        &self.config
    }

    /// Updates the region used when the client gets bound. Has no effect on an already bound
    /// client.
    pub fn set_region(&mut self, region: impl Into<String>) {
        self.config.region = region.into();
    }

    /// Binds the storage client if it isn't bound yet.
    pub async fn ensure_ready(&mut self) -> Result<(), ConfigError> {
        self.binding
            .ensure_ready(&self.config.client_settings())
            .await
            .map(|_| ())
    }

    pub fn is_ready(&self) -> bool {
        self.binding.is_ready()
    }

    /// Runs one gather cycle, forwarding every parsed metric to `acc`.
    pub async fn gather(&mut self, acc: &dyn Accumulator) -> Result<(), GatherError> {
        let store = self
            .binding
            .ensure_ready(&self.config.client_settings())
            .await?;

        for key in &self.config.keys {
            let metrics = self.read_metrics(store.as_ref(), key).await?;
            debug!("Forwarding {} metrics from {}", metrics.len(), key);

            let source = (!self.config.key_tag.is_empty()).then(|| base_name(key));
            for mut metric in metrics {
                if let Some(source) = &source {
                    metric.add_tag(self.config.key_tag.as_str(), source.as_str());
                }
                acc.add_metric(metric);
            }
        }

        Ok(())
    }

    async fn read_metrics(
        &self,
        store: &dyn ObjectStore,
        key: &str,
    ) -> Result<Vec<Metric>, GatherError> {
        let body = store.get_object(&self.config.bucket, key).await?;
        let text = self
            .decoder
            .read(body)
            .await
            .map_err(|source| GatherError::Read {
                key: key.to_string(),
                source,
            })?;
        Ok(self.parser.parse(&text)?)
    }
}

impl std::fmt::Debug for S3File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3File")
            .field("config", &self.config)
            .field("decoder", &self.decoder)
            .field("binding", &self.binding)
            .finish()
    }
}

/// Last element of a `/` separated key, ignoring trailing slashes.
///
/// An empty key yields `.` and a key made only of slashes yields `/`.
pub fn base_name(key: &str) -> String {
    if key.is_empty() {
        return ".".to_string();
    }
    let trimmed = key.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind('/') {
        Some(i) => trimmed[i + 1..].to_string(),
        None => trimmed.to_string(),
    }
}
