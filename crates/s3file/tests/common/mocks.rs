// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-ins for the storage service, the parser and the accumulator

#![allow(dead_code)]

use async_trait::async_trait;
use s3file::{
    accumulator_service::Accumulator,
    client::{ClientFactory, ClientSettings},
    errors::{ConfigError, ParseError, StorageError},
    line_protocol::LineProtocolParser,
    metric::Metric,
    object::{ObjectBody, ObjectStore},
    parser::Parser,
};
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Ordered record of what happened during a gather cycle
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: String) {
        self.0.lock().expect("lock poisoned").push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().expect("lock poisoned").clone()
    }
}

enum MockObject {
    Body(Vec<u8>),
    Truncated(Vec<u8>),
}

/// Object store serving objects from memory
///
/// Keys without an object answer with `StorageError::NotFound`.
#[derive(Clone, Default)]
pub struct MockObjectStore {
    objects: Arc<Mutex<HashMap<String, MockObject>>>,
    requested: Arc<Mutex<Vec<(String, String)>>>,
    open_bodies: Arc<AtomicUsize>,
    log: EventLog,
}

impl MockObjectStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn with_object(self, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.objects
            .lock()
            .expect("lock poisoned")
            .insert(key.to_string(), MockObject::Body(bytes.into()));
        self
    }

    /// Object whose body fails after `prefix` has been read
    pub fn with_truncated_object(self, key: &str, prefix: impl Into<Vec<u8>>) -> Self {
        self.objects
            .lock()
            .expect("lock poisoned")
            .insert(key.to_string(), MockObject::Truncated(prefix.into()));
        self
    }

    /// (bucket, key) of every request, in order
    pub fn requested(&self) -> Vec<(String, String)> {
        self.requested.lock().expect("lock poisoned").clone()
    }

    /// Number of bodies handed out and not released yet
    pub fn open_bodies(&self) -> usize {
        self.open_bodies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StorageError> {
        self.requested
            .lock()
            .expect("lock poisoned")
            .push((bucket.to_string(), key.to_string()));
        self.log.push(format!("fetch {key}"));

        let objects = self.objects.lock().expect("lock poisoned");
        let (bytes, truncated) = match objects.get(key) {
            Some(MockObject::Body(bytes)) => (bytes.clone(), false),
            Some(MockObject::Truncated(bytes)) => (bytes.clone(), true),
            None => {
                return Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
        };

        self.open_bodies.fetch_add(1, Ordering::SeqCst);
        Ok(ObjectBody::new(
            key,
            TrackedReader {
                remaining: bytes,
                fail_at_end: truncated,
                open_bodies: Arc::clone(&self.open_bodies),
            },
        ))
    }
}

/// Reader decrementing the open body count when dropped
struct TrackedReader {
    remaining: Vec<u8>,
    fail_at_end: bool,
    open_bodies: Arc<AtomicUsize>,
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.remaining.is_empty() {
            if self.fail_at_end {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            return Poll::Ready(Ok(()));
        }
        let n = self.remaining.len().min(buf.remaining());
        let chunk: Vec<u8> = self.remaining.drain(..n).collect();
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.open_bodies.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Client factory handing out a shared `MockObjectStore`
pub struct MockClientFactory {
    store: MockObjectStore,
    connects: AtomicUsize,
    regions: Mutex<Vec<String>>,
}

impl MockClientFactory {
    pub fn new(store: MockObjectStore) -> Self {
        Self {
            store,
            connects: AtomicUsize::new(0),
            regions: Mutex::new(Vec::new()),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn regions(&self) -> Vec<String> {
        self.regions.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn connect(
        &self,
        settings: &ClientSettings,
    ) -> Result<Arc<dyn ObjectStore>, ConfigError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.regions
            .lock()
            .expect("lock poisoned")
            .push(settings.region.clone());
        Ok(Arc::new(self.store.clone()))
    }
}

/// Line protocol parser recording the text it receives
pub struct RecordingParser {
    inputs: Arc<Mutex<Vec<Vec<u8>>>>,
    log: EventLog,
}

impl RecordingParser {
    pub fn new(log: EventLog) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        let inputs = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inputs: Arc::clone(&inputs),
                log,
            },
            inputs,
        )
    }
}

impl Parser for RecordingParser {
    fn parse(&self, buf: &[u8]) -> Result<Vec<Metric>, ParseError> {
        self.inputs.lock().expect("lock poisoned").push(buf.to_vec());
        self.log.push("parse".to_string());
        LineProtocolParser.parse(buf)
    }
}

/// Accumulator keeping every metric it receives
#[derive(Default)]
pub struct RecordingAccumulator {
    metrics: Mutex<Vec<Metric>>,
    log: EventLog,
}

impl RecordingAccumulator {
    pub fn new(log: EventLog) -> Self {
        Self {
            metrics: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.lock().expect("lock poisoned").clone()
    }
}

impl Accumulator for RecordingAccumulator {
    fn add_metric(&self, metric: Metric) {
        self.log.push(format!("emit {}", metric.name));
        self.metrics.lock().expect("lock poisoned").push(metric);
    }
}
