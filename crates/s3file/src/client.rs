// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lazy, region-bound storage client.
//!
//! The [`ClientBinding`] owns an optional client and builds it on the first call to
//! [`ClientBinding::ensure_ready`]. Once built the client is kept for the lifetime of the
//! binding: later changes to the region or endpoint settings are not applied, only reported.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use tracing::{debug, warn};

use crate::errors::ConfigError;
use crate::object::{ObjectStore, S3ObjectStore};

/// Settings a storage client is built from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientSettings {
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

/// Builds region-scoped [`ObjectStore`] clients.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Called with a non-empty region.
    async fn connect(&self, settings: &ClientSettings) -> Result<Arc<dyn ObjectStore>, ConfigError>;
}

/// Builds AWS S3 clients from the default credential chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct S3ClientFactory;

#[async_trait]
impl ClientFactory for S3ClientFactory {
    async fn connect(&self, settings: &ClientSettings) -> Result<Arc<dyn ObjectStore>, ConfigError> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if let Some(endpoint) = &settings.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }
        if settings.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = aws_sdk_s3::Client::from_conf(s3_config_builder.build());
        Ok(Arc::new(S3ObjectStore::new(client)))
    }
}

struct BoundClient {
    settings: ClientSettings,
    store: Arc<dyn ObjectStore>,
}

/// Owns the storage client of one collector instance.
///
/// Not meant to be shared: `ensure_ready` takes `&mut self`, so a single instance can't race
/// two first uses against each other.
pub struct ClientBinding {
    factory: Arc<dyn ClientFactory>,
    client: Option<BoundClient>,
}

impl ClientBinding {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            client: None,
        }
    }

    /// Returns the bound client, building it on first use.
    ///
    /// An empty region fails with [`ConfigError::MissingRegion`] and leaves the binding
    /// uninitialized, so a later call can succeed once the region is set.
    pub async fn ensure_ready(
        &mut self,
        settings: &ClientSettings,
    ) -> Result<Arc<dyn ObjectStore>, ConfigError> {
        if let Some(bound) = &self.client {
            if bound.settings != *settings {
                warn!(
                    "S3 client settings changed after the client was created, keeping region {}",
                    bound.settings.region
                );
            }
            return Ok(Arc::clone(&bound.store));
        }

        if settings.region.trim().is_empty() {
            return Err(ConfigError::MissingRegion);
        }

        debug!("Creating S3 client for region {}", settings.region);
        let store = self.factory.connect(settings).await?;
        self.client = Some(BoundClient {
            settings: settings.clone(),
            store: Arc::clone(&store),
        });
        Ok(store)
    }

    pub fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    /// Region of the bound client, if any.
    pub fn region(&self) -> Option<&str> {
        self.client.as_ref().map(|bound| bound.settings.region.as_str())
    }
}

impl Debug for ClientBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBinding")
            .field("region", &self.region())
            .finish()
    }
}
