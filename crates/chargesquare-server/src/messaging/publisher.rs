use std::sync::Arc;

use super::{DeliveryReport, MessagingResult, TopicProducer};
use crate::models::StationMessage;

/// Publishes station envelopes, keyed by message id
#[derive(Clone)]
pub struct StationPublisher {
    producer: Arc<dyn TopicProducer>,
}

impl StationPublisher {
    pub fn new(producer: Arc<dyn TopicProducer>) -> Self {
        Self { producer }
    }

    pub fn topic(&self) -> &str {
        self.producer.topic()
    }

    pub async fn publish(&self, message: &StationMessage) -> MessagingResult<DeliveryReport> {
        let payload = serde_json::to_vec(message)?;

        tracing::debug!(
            topic = %self.producer.topic(),
            message_id = %message.message_id,
            station_id = ?message.payload.id,
            size_bytes = payload.len(),
            "Publishing station message"
        );

        let report = self.producer.send(message.key(), payload).await?;

        tracing::debug!(
            message_id = %message.message_id,
            partition = report.partition,
            offset = report.offset,
            "Station message delivered"
        );

        Ok(report)
    }
}
