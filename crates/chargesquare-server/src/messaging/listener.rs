//! Drives a [`TopicSubscription`] into the [`StationMessageHandler`]
//!
//! Delivery is at least once. A record's offset is committed only after the
//! handler has persisted it. When persisting fails with a retryable error the
//! partition is rewound to its committed offset, the rest of that partition's
//! batch is left for redelivery and the listener backs off before polling
//! again. Records that can never succeed (undecodable bytes, invalid payloads)
//! are logged and committed so they do not block their partition. If a commit
//! or rewind fails part way through a batch, every read position is dropped
//! and the next poll resumes from the committed offsets.

use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ConsumeError, InboundRecord, MessagingResult, StationMessageHandler, TopicSubscription};

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub max_records: usize,
    pub poll_wait: Duration,
    pub retry_backoff: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_records: 100,
            poll_wait: Duration::from_millis(500),
            retry_backoff: Duration::from_millis(1000),
        }
    }
}

/// What one poll did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records persisted and committed
    pub persisted: usize,
    /// Records committed without being persisted
    pub skipped: usize,
    /// Partitions rewound for redelivery
    pub rewound: Vec<i32>,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.persisted == 0 && self.skipped == 0 && self.rewound.is_empty()
    }
}

pub struct TopicListener {
    subscription: Box<dyn TopicSubscription>,
    handler: StationMessageHandler,
    config: ListenerConfig,
}

impl TopicListener {
    pub fn new(
        subscription: Box<dyn TopicSubscription>,
        handler: StationMessageHandler,
        config: ListenerConfig,
    ) -> Self {
        Self {
            subscription,
            handler,
            config,
        }
    }

    pub async fn run(mut self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(
            topic = %self.subscription.topic(),
            group_id = %self.subscription.group_id(),
            "Starting station listener"
        );

        loop {
            let outcome = tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping station listener");
                    break;
                }
                result = self.poll_once() => result,
            };

            let pause = match outcome {
                Ok(outcome) if outcome.rewound.is_empty() => None,
                Ok(outcome) => {
                    warn!(
                        partitions = ?outcome.rewound,
                        backoff_ms = self.config.retry_backoff.as_millis() as u64,
                        "Redelivering after failed persist"
                    );
                    Some(self.config.retry_backoff)
                },
                Err(e) => {
                    error!(error = %e, "Error polling station topic");
                    Some(self.config.retry_backoff)
                },
            };

            if let Some(pause) = pause {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        info!("Station listener stopped gracefully");
        Ok(())
    }

    /// Poll once and apply every record that was returned.
    pub async fn poll_once(&mut self) -> MessagingResult<BatchOutcome> {
        let records = self
            .subscription
            .poll(self.config.max_records, self.config.poll_wait)
            .await?;

        if records.is_empty() {
            return Ok(BatchOutcome::default());
        }
        debug!(record_count = records.len(), "Received station records");

        let result = self.apply_batch(records).await;
        if let Err(e) = &result {
            warn!(error = %e, "Station batch interrupted, resuming from committed offsets");
            self.subscription.reset_positions();
        }
        result
    }

    async fn apply_batch(&mut self, records: Vec<InboundRecord>) -> MessagingResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let mut rewound: HashSet<i32> = HashSet::new();

        for record in records {
            if rewound.contains(&record.partition) {
                continue;
            }

            match apply(&self.handler, &record).await {
                Ok(()) => {
                    self.subscription
                        .commit(record.partition, record.offset + 1)
                        .await?;
                    outcome.persisted += 1;
                },
                Err(e) if e.is_retryable() => {
                    warn!(
                        partition = record.partition,
                        offset = record.offset,
                        error = %e,
                        "Failed to persist station, will redeliver"
                    );
                    self.subscription.seek_to_committed(record.partition).await?;
                    rewound.insert(record.partition);
                    outcome.rewound.push(record.partition);
                },
                Err(e) => {
                    error!(
                        partition = record.partition,
                        offset = record.offset,
                        error = %e,
                        "Skipping station record that cannot be applied"
                    );
                    self.subscription
                        .commit(record.partition, record.offset + 1)
                        .await?;
                    outcome.skipped += 1;
                },
            }
        }

        Ok(outcome)
    }
}

async fn apply(handler: &StationMessageHandler, record: &InboundRecord) -> Result<(), ConsumeError> {
    let message = StationMessageHandler::decode(&record.value)?;
    handler.handle(message).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbError, DbResult, InMemoryStationRepository, StationRepository};
    use crate::messaging::memory::{MemorySubscription, MemoryTopic};
    use crate::messaging::{MessagingError, StationPublisher};
    use crate::models::{NewStation, Station, StationMessage, StationStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` saves with a connection error.
    struct FlakyRepository {
        inner: InMemoryStationRepository,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl StationRepository for FlakyRepository {
        async fn save(&self, station: NewStation) -> DbResult<Station> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
            }
            self.inner.save(station).await
        }

        async fn find_by_id(&self, id: i64) -> DbResult<Option<Station>> {
            self.inner.find_by_id(id).await
        }

        async fn find_all(&self) -> DbResult<Vec<Station>> {
            self.inner.find_all().await
        }
    }

    fn station(id: i64) -> NewStation {
        NewStation {
            id: Some(id),
            name: format!("Station {}", id),
            location: "Main St".to_string(),
            status: StationStatus::Available,
            power_output: 11.0,
            connector_type: "Type2".to_string(),
        }
    }

    fn config() -> ListenerConfig {
        ListenerConfig {
            max_records: 10,
            poll_wait: Duration::from_millis(20),
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_persists_and_commits() {
        let topic = MemoryTopic::new("stations", 3);
        let publisher = StationPublisher::new(topic.clone());
        let repo = Arc::new(InMemoryStationRepository::new());

        for id in [1, 2, 3] {
            publisher.publish(&StationMessage::new(station(id))).await.unwrap();
        }

        let mut listener = TopicListener::new(
            Box::new(topic.subscribe("group")),
            StationMessageHandler::new(repo.clone()),
            config(),
        );

        let outcome = listener.poll_once().await.unwrap();
        assert_eq!(outcome.persisted, 3);
        assert_eq!(repo.len().await, 3);

        // A fresh subscription in the same group has nothing left to read.
        let mut again = TopicListener::new(
            Box::new(topic.subscribe("group")),
            StationMessageHandler::new(repo.clone()),
            config(),
        );
        assert!(again.poll_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_is_redelivered_until_it_succeeds() {
        let topic = MemoryTopic::new("stations", 1);
        let publisher = StationPublisher::new(topic.clone());
        let repo = Arc::new(FlakyRepository {
            inner: InMemoryStationRepository::new(),
            failures: AtomicUsize::new(2),
        });

        publisher.publish(&StationMessage::new(station(7))).await.unwrap();
        publisher.publish(&StationMessage::new(station(8))).await.unwrap();

        let mut listener = TopicListener::new(
            Box::new(topic.subscribe("group")),
            StationMessageHandler::new(repo.clone()),
            config(),
        );

        let first = listener.poll_once().await.unwrap();
        assert_eq!(first.persisted, 0);
        assert_eq!(first.rewound, vec![0]);

        let second = listener.poll_once().await.unwrap();
        assert_eq!(second.rewound, vec![0]);

        let third = listener.poll_once().await.unwrap();
        assert_eq!(third.persisted, 2);
        assert!(third.rewound.is_empty());

        assert!(repo.find_by_id(7).await.unwrap().is_some());
        assert!(repo.find_by_id(8).await.unwrap().is_some());
    }

    /// Fails the first commit as if the offset store were unreachable.
    struct CommitFailsOnce {
        inner: MemorySubscription,
        failed: bool,
    }

    #[async_trait]
    impl TopicSubscription for CommitFailsOnce {
        fn topic(&self) -> &str {
            self.inner.topic()
        }

        fn group_id(&self) -> &str {
            self.inner.group_id()
        }

        async fn poll(
            &mut self,
            max_records: usize,
            max_wait: Duration,
        ) -> MessagingResult<Vec<InboundRecord>> {
            self.inner.poll(max_records, max_wait).await
        }

        async fn commit(&mut self, partition: i32, next_offset: i64) -> MessagingResult<()> {
            if !self.failed {
                self.failed = true;
                return Err(MessagingError::Config("offset store down".to_string()));
            }
            self.inner.commit(partition, next_offset).await
        }

        async fn seek_to_committed(&mut self, partition: i32) -> MessagingResult<()> {
            self.inner.seek_to_committed(partition).await
        }

        fn reset_positions(&mut self) {
            self.inner.reset_positions();
        }
    }

    #[tokio::test]
    async fn test_failed_commit_redelivers_rest_of_batch() {
        let topic = MemoryTopic::new("stations", 1);
        let publisher = StationPublisher::new(topic.clone());
        let repo = Arc::new(InMemoryStationRepository::new());

        for id in [1, 2, 3] {
            publisher.publish(&StationMessage::new(station(id))).await.unwrap();
        }

        let mut listener = TopicListener::new(
            Box::new(CommitFailsOnce {
                inner: topic.subscribe("group"),
                failed: false,
            }),
            StationMessageHandler::new(repo.clone()),
            config(),
        );

        let err = listener.poll_once().await.unwrap_err();
        assert!(err.to_string().contains("offset store down"));

        // Station 1 was saved but never committed, so the whole batch comes back.
        let outcome = listener.poll_once().await.unwrap();
        assert_eq!(outcome.persisted, 3);
        assert!(listener.poll_once().await.unwrap().is_empty());

        let mut ids: Vec<i64> = repo.find_all().await.unwrap().iter().map(|s| s.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_poison_record_is_skipped() {
        let topic = MemoryTopic::new("stations", 1);
        let repo = Arc::new(InMemoryStationRepository::new());

        topic.append(0, None, b"{not json".to_vec()).await.unwrap();
        let valid = serde_json::to_vec(&StationMessage::new(station(5))).unwrap();
        topic.append(0, None, valid).await.unwrap();

        let mut listener = TopicListener::new(
            Box::new(topic.subscribe("group")),
            StationMessageHandler::new(repo.clone()),
            config(),
        );

        let outcome = listener.poll_once().await.unwrap();
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.persisted, 1);
        assert!(repo.find_by_id(5).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let topic = MemoryTopic::new("stations", 3);
        let repo = Arc::new(InMemoryStationRepository::new());
        let listener = TopicListener::new(
            Box::new(topic.subscribe("group")),
            StationMessageHandler::new(repo),
            config(),
        );

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(listener.run(ctx.clone()));
        ctx.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
