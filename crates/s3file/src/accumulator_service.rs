// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::metric::Metric;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Receives the metrics emitted by a gather cycle, one call per metric.
pub trait Accumulator: Send + Sync {
    fn add_metric(&self, metric: Metric);
}

#[derive(Debug)]
pub enum AccumulatorCommand {
    Insert(Metric),
    Flush(oneshot::Sender<Vec<Metric>>),
    Shutdown,
}

#[derive(Clone, Debug)]
pub struct AccumulatorHandle {
    tx: mpsc::UnboundedSender<AccumulatorCommand>,
}

impl AccumulatorHandle {
    pub fn insert(&self, metric: Metric) -> Result<(), mpsc::error::SendError<AccumulatorCommand>> {
        self.tx.send(AccumulatorCommand::Insert(metric))
    }

    /// Returns every buffered metric in insertion order and clears the buffer.
    pub async fn flush(&self) -> Result<Vec<Metric>, String> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(AccumulatorCommand::Flush(response_tx))
            .map_err(|e| format!("Failed to send flush command: {}", e))?;

        response_rx
            .await
            .map_err(|e| format!("Failed to receive flush response: {}", e))
    }

    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<AccumulatorCommand>> {
        self.tx.send(AccumulatorCommand::Shutdown)
    }
}

impl Accumulator for AccumulatorHandle {
    fn add_metric(&self, metric: Metric) {
        if let Err(e) = self.insert(metric) {
            error!("Failed to send metric to accumulator: {}", e);
        }
    }
}

/// Buffers metrics between flushes. Driven by [`AccumulatorService::run`].
pub struct AccumulatorService {
    metrics: Vec<Metric>,
    max_buffered: usize,
    rx: mpsc::UnboundedReceiver<AccumulatorCommand>,
}

impl AccumulatorService {
    /// Creates the service and its handle. Metrics inserted while `max_buffered` metrics are
    /// already waiting for a flush are dropped.
    pub fn new(max_buffered: usize) -> (Self, AccumulatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let service = Self {
            metrics: Vec::new(),
            max_buffered,
            rx,
        };

        let handle = AccumulatorHandle { tx };

        (service, handle)
    }

    pub async fn run(mut self) {
        debug!("Accumulator service started");

        let mut dropped = 0usize;
        while let Some(command) = self.rx.recv().await {
            match command {
                AccumulatorCommand::Insert(metric) => {
                    if self.metrics.len() < self.max_buffered {
                        self.metrics.push(metric);
                    } else {
                        dropped += 1;
                    }
                }

                AccumulatorCommand::Flush(response_tx) => {
                    if dropped > 0 {
                        warn!("Total of {} metrics dropped since last flush", dropped);
                        dropped = 0;
                    }
                    let metrics = std::mem::take(&mut self.metrics);
                    if response_tx.send(metrics).is_err() {
                        error!("Failed to send flush response - receiver dropped");
                    }
                }

                AccumulatorCommand::Shutdown => {
                    debug!("Accumulator service shutting down");
                    break;
                }
            }
        }

        debug!("Accumulator service stopped");
    }
}
