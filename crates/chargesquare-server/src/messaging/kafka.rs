//! Kafka topic backend on top of `rskafka`
//!
//! `rskafka` talks to partitions directly and has no group coordinator, so
//! committed positions live in an [`OffsetStore`] (the `consumer_offsets`
//! table in production). A subscription keeps one read position per partition
//! and fetches all partitions concurrently.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use rskafka::client::error::{Error as RsKafkaError, ProtocolError};
use rskafka::client::partition::{Compression, OffsetAt, PartitionClient, UnknownTopicHandling};
use rskafka::client::ClientBuilder;
use rskafka::record::{Record, RecordAndOffset};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::{
    partition_for_key, DeliveryReport, InboundRecord, MessagingError, MessagingResult,
    TopicProducer, TopicSubscription,
};
use crate::db::OffsetStore;

/// Upper bound on the bytes fetched from one partition per poll.
const MAX_FETCH_BYTES: i32 = 1_048_576;

/// Broker-side timeout for topic creation.
const CREATE_TOPIC_TIMEOUT_MS: i32 = 5_000;

#[derive(Debug, Clone)]
pub struct KafkaTopicConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub partitions: i32,
    pub replication_factor: i16,
}

/// A connected topic with one client per partition
pub struct KafkaTopic {
    name: String,
    partitions: Vec<PartitionClient>,
}

impl std::fmt::Debug for KafkaTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaTopic")
            .field("name", &self.name)
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

impl KafkaTopic {
    /// Connect to the cluster, creating the topic if it does not exist yet.
    pub async fn connect(config: &KafkaTopicConfig) -> MessagingResult<Arc<Self>> {
        if config.brokers.is_empty() {
            return Err(MessagingError::Config(
                "at least one Kafka broker is required".to_string(),
            ));
        }
        if config.partitions < 1 {
            return Err(MessagingError::Config(format!(
                "topic '{}' needs at least one partition",
                config.topic
            )));
        }

        let client = ClientBuilder::new(config.brokers.clone()).build().await?;

        let controller = client.controller_client()?;
        match controller
            .create_topic(
                config.topic.clone(),
                config.partitions,
                config.replication_factor,
                CREATE_TOPIC_TIMEOUT_MS,
            )
            .await
        {
            Ok(()) => tracing::info!(
                topic = %config.topic,
                partitions = config.partitions,
                replication_factor = config.replication_factor,
                "Created Kafka topic"
            ),
            Err(RsKafkaError::ServerError {
                protocol_error: ProtocolError::TopicAlreadyExists,
                ..
            }) => tracing::debug!(topic = %config.topic, "Kafka topic already exists"),
            Err(e) => return Err(e.into()),
        }

        let mut partitions = Vec::with_capacity(config.partitions as usize);
        for partition in 0..config.partitions {
            let partition_client = client
                .partition_client(config.topic.clone(), partition, UnknownTopicHandling::Retry)
                .await?;
            partitions.push(partition_client);
        }

        tracing::info!(
            topic = %config.topic,
            brokers = ?config.brokers,
            "Connected to Kafka"
        );

        Ok(Arc::new(Self {
            name: config.topic.clone(),
            partitions,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_count(&self) -> i32 {
        self.partitions.len() as i32
    }

    pub fn subscribe(
        self: &Arc<Self>,
        group_id: impl Into<String>,
        offsets: Arc<dyn OffsetStore>,
    ) -> KafkaSubscription {
        KafkaSubscription {
            topic: Arc::clone(self),
            group_id: group_id.into(),
            offsets,
            positions: None,
        }
    }

    fn partition(&self, partition: i32) -> MessagingResult<&PartitionClient> {
        usize::try_from(partition)
            .ok()
            .and_then(|index| self.partitions.get(index))
            .ok_or_else(|| MessagingError::UnknownPartition {
                topic: self.name.clone(),
                partition,
            })
    }
}

#[async_trait]
impl TopicProducer for KafkaTopic {
    fn topic(&self) -> &str {
        &self.name
    }

    async fn send(&self, key: &str, value: Vec<u8>) -> MessagingResult<DeliveryReport> {
        let partition = partition_for_key(key.as_bytes(), self.partition_count());
        let record = Record {
            key: Some(key.as_bytes().to_vec()),
            value: Some(value),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        let offsets = self
            .partition(partition)?
            .produce(vec![record], Compression::NoCompression)
            .await?;

        let offset = offsets.first().copied().ok_or_else(|| {
            MessagingError::Config(format!(
                "broker returned no offset for produce to partition {}",
                partition
            ))
        })?;

        Ok(DeliveryReport { partition, offset })
    }
}

pub struct KafkaSubscription {
    topic: Arc<KafkaTopic>,
    group_id: String,
    offsets: Arc<dyn OffsetStore>,
    positions: Option<Vec<i64>>,
}

impl KafkaSubscription {
    /// Committed offset for `partition`, or the earliest retained offset.
    async fn starting_offset(&self, partition: i32) -> MessagingResult<i64> {
        let committed = self
            .offsets
            .load(&self.group_id, &self.topic.name, partition)
            .await?;
        match committed {
            Some(offset) => Ok(offset),
            None => Ok(self
                .topic
                .partition(partition)?
                .get_offset(OffsetAt::Earliest)
                .await?),
        }
    }

    async fn positions(&mut self) -> MessagingResult<&mut Vec<i64>> {
        if self.positions.is_none() {
            let mut positions = Vec::with_capacity(self.topic.partitions.len());
            for partition in 0..self.topic.partition_count() {
                positions.push(self.starting_offset(partition).await?);
            }
            tracing::info!(
                topic = %self.topic.name,
                group_id = %self.group_id,
                positions = ?positions,
                "Kafka subscription positioned"
            );
            self.positions = Some(positions);
        }
        Ok(self.positions.get_or_insert_with(Vec::new))
    }
}

#[async_trait]
impl TopicSubscription for KafkaSubscription {
    fn topic(&self) -> &str {
        &self.topic.name
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }

    async fn poll(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> MessagingResult<Vec<InboundRecord>> {
        let max_records = max_records.max(1);
        let max_wait_ms = i32::try_from(max_wait.as_millis()).unwrap_or(i32::MAX);
        let topic = Arc::clone(&self.topic);
        let positions = self.positions().await?;

        let fetches = topic.partitions.iter().zip(positions.iter()).map(
            |(client, &position)| async move {
                client
                    .fetch_records(position, 1..MAX_FETCH_BYTES, max_wait_ms)
                    .await
            },
        );
        let results = join_all(fetches).await;

        // Positions only move once every partition has been read
        let mut next = positions.clone();
        let mut records = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            let partition = index as i32;
            let fetched: Vec<RecordAndOffset> = match result {
                Ok((fetched, _high_watermark)) => fetched,
                Err(RsKafkaError::ServerError {
                    protocol_error: ProtocolError::OffsetOutOfRange,
                    ..
                }) => {
                    let earliest = topic.partitions[index].get_offset(OffsetAt::Earliest).await?;
                    tracing::warn!(
                        partition,
                        old_offset = next[index],
                        new_offset = earliest,
                        "Consumer offset out of range; resetting to earliest"
                    );
                    next[index] = earliest;
                    continue;
                },
                Err(e) => return Err(e.into()),
            };

            for fetched_record in fetched {
                if records.len() >= max_records {
                    break;
                }
                if fetched_record.offset < next[index] {
                    continue;
                }
                next[index] = fetched_record.offset + 1;
                records.push(InboundRecord {
                    partition,
                    offset: fetched_record.offset,
                    key: fetched_record.record.key,
                    value: fetched_record.record.value.unwrap_or_default(),
                });
            }
        }

        *positions = next;
        Ok(records)
    }

    async fn commit(&mut self, partition: i32, next_offset: i64) -> MessagingResult<()> {
        self.topic.partition(partition)?;
        self.offsets
            .commit(&self.group_id, &self.topic.name, partition, next_offset)
            .await?;
        Ok(())
    }

    async fn seek_to_committed(&mut self, partition: i32) -> MessagingResult<()> {
        self.topic.partition(partition)?;
        let offset = self.starting_offset(partition).await?;
        let positions = self.positions().await?;
        positions[partition as usize] = offset;
        tracing::debug!(partition, offset, "Rewound partition to committed offset");
        Ok(())
    }

    fn reset_positions(&mut self) {
        self.positions = None;
    }
}
