//! Timer-driven fetch cycles
//!
//! A tick starts a cycle in its own task. Cycles never overlap: a tick that
//! arrives while the previous cycle still holds the guard is skipped.

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::client::OpenChargeMapClient;
use super::normalizer::normalize_value;
use super::IngestResult;
use crate::messaging::StationPublisher;
use crate::models::StationMessage;

/// Counters for one fetch cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub rejected: usize,
    pub published: usize,
    pub publish_failed: usize,
}

pub struct StationPoller {
    client: OpenChargeMapClient,
    publisher: StationPublisher,
    interval: Duration,
    in_flight: Arc<Mutex<()>>,
}

impl StationPoller {
    pub fn new(
        client: OpenChargeMapClient,
        publisher: StationPublisher,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            publisher,
            interval,
            in_flight: Arc::new(Mutex::new(())),
        })
    }

    pub async fn run(self: Arc<Self>, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            topic = %self.publisher.topic(),
            "Starting station poller"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping station poller");
                    break;
                }
                _ = ticker.tick() => {
                    if self.try_start_cycle().is_none() {
                        warn!("Previous fetch cycle still running, skipping this tick");
                    }
                }
            }
        }

        // Let a running cycle finish publishing before returning.
        drop(self.in_flight.lock().await);
        info!("Station poller stopped gracefully");
        Ok(())
    }

    /// Start a cycle in the background unless one is already running.
    pub fn try_start_cycle(self: &Arc<Self>) -> Option<JoinHandle<IngestResult<CycleStats>>> {
        let guard = Arc::clone(&self.in_flight).try_lock_owned().ok()?;
        let poller = Arc::clone(self);

        Some(tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            let result = poller.run_cycle().await;
            match &result {
                Ok(stats) => info!(
                    fetched = stats.fetched,
                    rejected = stats.rejected,
                    published = stats.published,
                    publish_failed = stats.publish_failed,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Completed fetch cycle"
                ),
                Err(e) => error!(error = %e, "Fetch cycle abandoned"),
            }
            result
        }))
    }

    /// Fetch, normalize, wrap and publish one page of stations.
    pub async fn run_cycle(&self) -> IngestResult<CycleStats> {
        info!("Starting fetch of charging stations");
        let records = self.client.fetch().await?;

        let mut stats = CycleStats {
            fetched: records.len(),
            ..Default::default()
        };

        let mut messages = Vec::with_capacity(records.len());
        for record in records {
            match normalize_value(record) {
                Ok(station) => messages.push(StationMessage::new(station)),
                Err(e) => {
                    warn!(error = %e, "Skipping station record");
                    stats.rejected += 1;
                },
            }
        }

        let deliveries = join_all(messages.iter().map(|message| async move {
            (message, self.publisher.publish(message).await)
        }))
        .await;

        for (message, delivery) in deliveries {
            match delivery {
                Ok(report) => {
                    debug!(
                        message_id = %message.message_id,
                        station_id = ?message.payload.id,
                        partition = report.partition,
                        offset = report.offset,
                        "Published station message"
                    );
                    stats.published += 1;
                },
                Err(e) => {
                    error!(
                        message_id = %message.message_id,
                        station_id = ?message.payload.id,
                        error = %e,
                        "Failed to publish station message"
                    );
                    stats.publish_failed += 1;
                },
            }
        }

        Ok(stats)
    }
}
