// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::future::Future;
use std::io::Write;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use s3file::{
    accumulator_service::{AccumulatorHandle, AccumulatorService},
    config::S3FileConfig,
    errors::GatherError,
    s3file::S3File,
};

const DEFAULT_INTERVAL_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_BUFFERED_METRICS: usize = 100_000;

#[tokio::main]
pub async fn main() {
    let log_level = env::var("S3FILE_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!(
        "h2=off,hyper=off,rustls=off,aws_smithy_runtime=warn,aws_config=warn,{}",
        log_level
    );

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let interval_secs = env::var("S3FILE_INTERVAL_SECS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_INTERVAL_SECS);
    let timeout_secs = env::var("S3FILE_TIMEOUT_SECS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let config = match env::var("S3FILE_CONFIG_FILE") {
        Ok(path) => S3FileConfig::from_json_file(path),
        Err(_) => S3FileConfig::from_env(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("Error loading s3file configuration: {e}");
            return;
        }
    };
    if config.keys.is_empty() {
        warn!("No keys configured, gather cycles will not read any object");
    }

    let mut s3file = match S3File::from_config(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Error creating s3file collector: {e}");
            return;
        }
    };

    let (service, accumulator) = AccumulatorService::new(MAX_BUFFERED_METRICS);
    tokio::spawn(service.run());

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {e}");
            return;
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    info!(
        "Gathering {} objects from s3://{} every {interval_secs}s",
        s3file.config().keys.len(),
        s3file.config().bucket
    );

    let cycle_timeout = Duration::from_secs(timeout_secs);
    let mut gather_interval = interval(Duration::from_secs(interval_secs));
    gather_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = gather_interval.tick() => {}
            _ = cancel_token.cancelled() => break,
        }

        let outcome = run_cycle(
            s3file.gather(&accumulator),
            cycle_timeout,
            &cancel_token,
        )
        .await;
        match outcome {
            CycleOutcome::Completed => debug!("Gather cycle completed"),
            CycleOutcome::Failed(e) => error!("Error in s3file gather cycle: {e}"),
            CycleOutcome::TimedOut => {
                error!("s3file gather cycle timed out after {timeout_secs}s")
            }
            CycleOutcome::Cancelled => {
                info!("Gather cycle interrupted by shutdown");
                break;
            }
        }

        write_metrics(&accumulator).await;
    }

    write_metrics(&accumulator).await;
    if let Err(e) = accumulator.shutdown() {
        error!("Failed to shut down accumulator: {e}");
    }
}

#[derive(Debug)]
enum CycleOutcome {
    Completed,
    Failed(GatherError),
    TimedOut,
    Cancelled,
}

/// Runs one gather cycle under `deadline`, giving up early when `cancel_token` fires.
///
/// Dropping an unfinished cycle releases any object body it was reading.
async fn run_cycle<F>(cycle: F, deadline: Duration, cancel_token: &CancellationToken) -> CycleOutcome
where
    F: Future<Output = Result<(), GatherError>>,
{
    tokio::select! {
        result = timeout(deadline, cycle) => match result {
            Ok(Ok(())) => CycleOutcome::Completed,
            Ok(Err(e)) => CycleOutcome::Failed(e),
            Err(_) => CycleOutcome::TimedOut,
        },
        _ = cancel_token.cancelled() => CycleOutcome::Cancelled,
    }
}

async fn write_metrics(accumulator: &AccumulatorHandle) {
    let metrics = match accumulator.flush().await {
        Ok(metrics) => metrics,
        Err(e) => {
            error!("Failed to flush accumulator: {e}");
            return;
        }
    };
    debug!("Writing {} metrics", metrics.len());

    let mut stdout = std::io::stdout().lock();
    for metric in &metrics {
        if let Err(e) = writeln!(stdout, "{metric}") {
            error!("Failed to write metric: {e}");
            return;
        }
    }
    if let Err(e) = stdout.flush() {
        error!("Failed to flush stdout: {e}");
    }
}
