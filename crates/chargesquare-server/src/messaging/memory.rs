//! In-process partitioned topic
//!
//! Used when no Kafka brokers are configured and throughout the tests. Each
//! partition is an append-only `Vec`; the offset of a record is its index.
//! Committed group offsets are kept in an [`InMemoryOffsetStore`] owned by the
//! topic, so several subscriptions in one group share progress.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};

use super::{
    partition_for_key, DeliveryReport, InboundRecord, MessagingError, MessagingResult,
    TopicProducer, TopicSubscription,
};
use crate::db::{InMemoryOffsetStore, OffsetStore};

#[derive(Debug, Clone)]
struct StoredRecord {
    key: Option<Vec<u8>>,
    value: Vec<u8>,
}

#[derive(Debug)]
pub struct MemoryTopic {
    name: String,
    partitions: RwLock<Vec<Vec<StoredRecord>>>,
    partition_count: i32,
    appended: Notify,
    offsets: InMemoryOffsetStore,
}

impl MemoryTopic {
    pub fn new(name: impl Into<String>, partitions: i32) -> Arc<Self> {
        let partition_count = partitions.max(1);
        Arc::new(Self {
            name: name.into(),
            partitions: RwLock::new(vec![Vec::new(); partition_count as usize]),
            partition_count,
            appended: Notify::new(),
            offsets: InMemoryOffsetStore::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_count(&self) -> i32 {
        self.partition_count
    }

    /// Number of records written to `partition` so far.
    pub async fn high_watermark(&self, partition: i32) -> MessagingResult<i64> {
        let partitions = self.partitions.read().await;
        let log = partitions
            .get(partition as usize)
            .ok_or_else(|| self.unknown_partition(partition))?;
        Ok(log.len() as i64)
    }

    pub fn subscribe(self: &Arc<Self>, group_id: impl Into<String>) -> MemorySubscription {
        MemorySubscription {
            topic: Arc::clone(self),
            group_id: group_id.into(),
            positions: None,
        }
    }

    /// Append a record to an explicit partition, bypassing the key partitioner.
    pub async fn append(
        &self,
        partition: i32,
        key: Option<Vec<u8>>,
        value: Vec<u8>,
    ) -> MessagingResult<DeliveryReport> {
        let mut partitions = self.partitions.write().await;
        let log = partitions
            .get_mut(partition as usize)
            .ok_or_else(|| self.unknown_partition(partition))?;
        log.push(StoredRecord { key, value });
        let offset = (log.len() - 1) as i64;
        drop(partitions);

        self.appended.notify_waiters();
        Ok(DeliveryReport { partition, offset })
    }

    fn unknown_partition(&self, partition: i32) -> MessagingError {
        MessagingError::UnknownPartition {
            topic: self.name.clone(),
            partition,
        }
    }
}

#[async_trait]
impl TopicProducer for MemoryTopic {
    fn topic(&self) -> &str {
        &self.name
    }

    async fn send(&self, key: &str, value: Vec<u8>) -> MessagingResult<DeliveryReport> {
        let partition = partition_for_key(key.as_bytes(), self.partition_count);
        self.append(partition, Some(key.as_bytes().to_vec()), value).await
    }
}

pub struct MemorySubscription {
    topic: Arc<MemoryTopic>,
    group_id: String,
    positions: Option<Vec<i64>>,
}

impl MemorySubscription {
    async fn committed(&self, partition: i32) -> MessagingResult<i64> {
        let offset = self
            .topic
            .offsets
            .load(&self.group_id, &self.topic.name, partition)
            .await?;
        Ok(offset.unwrap_or(0))
    }

    async fn positions(&mut self) -> MessagingResult<&mut Vec<i64>> {
        if self.positions.is_none() {
            let mut positions = Vec::with_capacity(self.topic.partition_count as usize);
            for partition in 0..self.topic.partition_count {
                positions.push(self.committed(partition).await?);
            }
            self.positions = Some(positions);
        }
        Ok(self.positions.get_or_insert_with(Vec::new))
    }

    async fn take_available(&mut self, max_records: usize) -> MessagingResult<Vec<InboundRecord>> {
        let topic = Arc::clone(&self.topic);
        let positions = self.positions().await?;
        let partitions = topic.partitions.read().await;

        let mut records = Vec::new();
        for (index, log) in partitions.iter().enumerate() {
            let position = &mut positions[index];
            while records.len() < max_records {
                let Some(stored) = log.get(*position as usize) else {
                    break;
                };
                records.push(InboundRecord {
                    partition: index as i32,
                    offset: *position,
                    key: stored.key.clone(),
                    value: stored.value.clone(),
                });
                *position += 1;
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl TopicSubscription for MemorySubscription {
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
        let topic = Arc::clone(&self.topic);
        let appended = topic.appended.notified();

        let records = self.take_available(max_records).await?;
        if !records.is_empty() {
            return Ok(records);
        }

        if tokio::time::timeout(max_wait, appended).await.is_err() {
            return Ok(Vec::new());
        }
        self.take_available(max_records).await
    }

    async fn commit(&mut self, partition: i32, next_offset: i64) -> MessagingResult<()> {
        if partition < 0 || partition >= self.topic.partition_count {
            return Err(self.topic.unknown_partition(partition));
        }
        self.topic
            .offsets
            .commit(&self.group_id, &self.topic.name, partition, next_offset)
            .await?;
        Ok(())
    }

    async fn seek_to_committed(&mut self, partition: i32) -> MessagingResult<()> {
        if partition < 0 || partition >= self.topic.partition_count {
            return Err(self.topic.unknown_partition(partition));
        }
        let committed = self.committed(partition).await?;
        let positions = self.positions().await?;
        positions[partition as usize] = committed;
        Ok(())
    }

    fn reset_positions(&mut self) {
        self.positions = None;
    }
}
