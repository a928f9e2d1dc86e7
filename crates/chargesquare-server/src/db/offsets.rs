//! Committed consumer positions
//!
//! A committed offset is the *next* offset the group should read from a
//! partition. Nothing committed means start from the earliest record.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{DbError, DbResult};

#[async_trait]
pub trait OffsetStore: Send + Sync {
    async fn load(&self, group_id: &str, topic: &str, partition: i32) -> DbResult<Option<i64>>;

    async fn commit(
        &self,
        group_id: &str,
        topic: &str,
        partition: i32,
        next_offset: i64,
    ) -> DbResult<()>;
}

#[derive(Debug, Clone)]
pub struct PgOffsetStore {
    pool: PgPool,
}

impl PgOffsetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OffsetStore for PgOffsetStore {
    async fn load(&self, group_id: &str, topic: &str, partition: i32) -> DbResult<Option<i64>> {
        let offset: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT next_offset
            FROM consumer_offsets
            WHERE group_id = $1 AND topic = $2 AND partition = $3
            "#,
        )
        .bind(group_id)
        .bind(topic)
        .bind(partition)
        .fetch_optional(&self.pool)
        .await?;

        Ok(offset)
    }

    async fn commit(
        &self,
        group_id: &str,
        topic: &str,
        partition: i32,
        next_offset: i64,
    ) -> DbResult<()> {
        if next_offset < 0 {
            return Err(DbError::invalid(format!("offset {} is negative", next_offset)));
        }

        sqlx::query(
            r#"
            INSERT INTO consumer_offsets (group_id, topic, partition, next_offset, committed_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (group_id, topic, partition) DO UPDATE SET
                next_offset = EXCLUDED.next_offset,
                committed_at = NOW()
            "#,
        )
        .bind(group_id)
        .bind(topic)
        .bind(partition)
        .bind(next_offset)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

type OffsetKey = (String, String, i32);

#[derive(Debug, Default)]
pub struct InMemoryOffsetStore {
    offsets: Mutex<HashMap<OffsetKey, i64>>,
}

impl InMemoryOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(group_id: &str, topic: &str, partition: i32) -> OffsetKey {
        (group_id.to_string(), topic.to_string(), partition)
    }
}

#[async_trait]
impl OffsetStore for InMemoryOffsetStore {
    async fn load(&self, group_id: &str, topic: &str, partition: i32) -> DbResult<Option<i64>> {
        let offsets = self
            .offsets
            .lock()
            .map_err(|_| DbError::invalid("offset map lock poisoned"))?;
        Ok(offsets.get(&Self::key(group_id, topic, partition)).copied())
    }

    async fn commit(
        &self,
        group_id: &str,
        topic: &str,
        partition: i32,
        next_offset: i64,
    ) -> DbResult<()> {
        if next_offset < 0 {
            return Err(DbError::invalid(format!("offset {} is negative", next_offset)));
        }
        let mut offsets = self
            .offsets
            .lock()
            .map_err(|_| DbError::invalid("offset map lock poisoned"))?;
        offsets.insert(Self::key(group_id, topic, partition), next_offset);
        Ok(())
    }
}
