//! Partitioned topic plumbing between the poller and the store
//!
//! Producers and subscriptions are traits so the pipeline runs against either
//! a Kafka cluster ([`kafka`]) or an in-process log ([`memory`]). Both backends
//! share the same semantics:
//!
//! - a record's partition is chosen from its key with Kafka's murmur2
//!   partitioner
//! - a subscription reads each partition in offset order, starting from the
//!   group's committed offset
//! - a committed offset is the next offset to read

pub mod consumer;
pub mod kafka;
pub mod listener;
pub mod memory;
pub mod publisher;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::db::DbError;

pub use consumer::{ConsumeError, StationMessageHandler};
pub use listener::{ListenerConfig, TopicListener};
pub use publisher::StationPublisher;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rskafka::client::error::Error),

    #[error("Offset store error: {0}")]
    Offsets(#[from] DbError),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Partition {partition} does not exist on topic '{topic}'")]
    UnknownPartition { topic: String, partition: i32 },

    #[error("Messaging configuration error: {0}")]
    Config(String),
}

pub type MessagingResult<T> = Result<T, MessagingError>;

/// Where a produced record landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub partition: i32,
    pub offset: i64,
}

/// A record read from a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRecord {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

#[async_trait]
pub trait TopicProducer: Send + Sync {
    fn topic(&self) -> &str;

    async fn send(&self, key: &str, value: Vec<u8>) -> MessagingResult<DeliveryReport>;
}

/// A consumer group's view of one topic
#[async_trait]
pub trait TopicSubscription: Send {
    fn topic(&self) -> &str;

    fn group_id(&self) -> &str;

    /// Read up to `max_records`, waiting at most `max_wait` when nothing is
    /// available. Each partition's records come back in offset order.
    async fn poll(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> MessagingResult<Vec<InboundRecord>>;

    /// Record that everything before `next_offset` on `partition` is done.
    async fn commit(&mut self, partition: i32, next_offset: i64) -> MessagingResult<()>;

    /// Rewind `partition` to the last committed offset so uncommitted records
    /// are delivered again.
    async fn seek_to_committed(&mut self, partition: i32) -> MessagingResult<()>;

    /// Forget every read position. The next poll starts again from the
    /// committed offsets.
    fn reset_positions(&mut self);
}

/// Kafka's default partitioner: `toPositive(murmur2(key)) % partitions`.
pub fn partition_for_key(key: &[u8], partitions: i32) -> i32 {
    if partitions <= 1 {
        return 0;
    }
    let positive = (murmur2(key) & 0x7fff_ffff) as i32;
    positive % partitions
}

/// MurmurHash2 as implemented by the Java Kafka client (seed `0x9747b28c`).
pub fn murmur2(data: &[u8]) -> u32 {
    const SEED: u32 = 0x9747_b28c;
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let length = data.len();
    let mut h: u32 = SEED ^ (length as u32);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    match tail.len() {
        3 => {
            h ^= u32::from(tail[2]) << 16;
            h ^= u32::from(tail[1]) << 8;
            h ^= u32::from(tail[0]);
            h = h.wrapping_mul(M);
        },
        2 => {
            h ^= u32::from(tail[1]) << 8;
            h ^= u32::from(tail[0]);
            h = h.wrapping_mul(M);
        },
        1 => {
            h ^= u32::from(tail[0]);
            h = h.wrapping_mul(M);
        },
        _ => {},
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}
